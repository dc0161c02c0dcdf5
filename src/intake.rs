//! Course import from a JSON document.
//!
//! Importing the same course twice is safe: concepts are matched on their
//! normalized, diacritic-folded term and only missing details and new
//! questions are added.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::{Database, NewConcept};
use crate::error::{Error, Result};
use crate::grading::{match_key, normalize};
use crate::models::{Concept, ConceptKind, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseImport {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub concepts: Vec<ConceptImport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptImport {
    pub term: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionImport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionImport {
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MergeDecision {
    Create,
    Merge(i64),
    Skip(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub course_id: i64,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    pub questions_added: usize,
}

pub fn load_import(path: &Path) -> Result<CourseImport> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Decide, per incoming concept, whether it is new, a duplicate of an
/// existing concept, or unusable.
pub fn plan_import(existing: &[Concept], incoming: &[ConceptImport]) -> Vec<MergeDecision> {
    let mut seen = HashSet::new();

    incoming
        .iter()
        .map(|concept| {
            let key = match_key(&concept.term);
            if key.is_empty() {
                return MergeDecision::Skip("empty term".to_string());
            }
            if !seen.insert(key.clone()) {
                return MergeDecision::Skip(format!("duplicate term '{}'", concept.term.trim()));
            }
            existing
                .iter()
                .find(|c| match_key(&c.term) == key)
                .map(|c| MergeDecision::Merge(c.id))
                .unwrap_or(MergeDecision::Create)
        })
        .collect()
}

pub fn import_course(db: &Database, payload: &CourseImport) -> Result<ImportSummary> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(Error::invalid("course title must not be empty"));
    }

    let course_id = match db.find_course_by_title(title)? {
        Some(course) => course.id,
        None => db.add_course(title, payload.description.as_deref())?,
    };

    let existing: Vec<Concept> = db
        .list_with_progress(Some(course_id))?
        .into_iter()
        .map(|c| c.concept)
        .collect();
    let decisions = plan_import(&existing, &payload.concepts);

    let mut summary = ImportSummary {
        course_id,
        ..ImportSummary::default()
    };

    for (decision, incoming) in decisions.iter().zip(&payload.concepts) {
        match decision {
            MergeDecision::Create => {
                let kind = parse_kind(incoming.kind.as_deref());
                let concept_id = db.add_concept(&NewConcept {
                    course_id: Some(course_id),
                    term: &incoming.term,
                    translation: &incoming.translation,
                    kind,
                    notes: non_empty(incoming.notes.as_deref()),
                })?;
                summary.created += 1;
                summary.questions_added +=
                    add_new_questions(db, concept_id, HashSet::new(), &incoming.questions)?;
            }
            MergeDecision::Merge(concept_id) => {
                if let Some(current) = existing.iter().find(|c| c.id == *concept_id) {
                    let translation = if current.translation.trim().is_empty() {
                        non_empty(Some(incoming.translation.as_str()))
                    } else {
                        None
                    };
                    let notes = if non_empty(current.notes.as_deref()).is_none() {
                        non_empty(incoming.notes.as_deref())
                    } else {
                        None
                    };
                    if translation.is_some() || notes.is_some() {
                        db.update_concept_details(*concept_id, translation, notes)?;
                    }
                }

                let known: HashSet<String> = db
                    .list_questions(*concept_id)?
                    .iter()
                    .map(|q| normalize(&q.prompt))
                    .collect();
                summary.merged += 1;
                summary.questions_added +=
                    add_new_questions(db, *concept_id, known, &incoming.questions)?;
            }
            MergeDecision::Skip(reason) => {
                tracing::warn!(term = incoming.term.as_str(), reason = reason.as_str(), "skipped concept");
                summary.skipped += 1;
            }
        }
    }

    tracing::info!(
        course_id,
        created = summary.created,
        merged = summary.merged,
        skipped = summary.skipped,
        questions = summary.questions_added,
        "imported course"
    );
    Ok(summary)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_kind(kind: Option<&str>) -> ConceptKind {
    match kind {
        None => ConceptKind::Vocabulary,
        Some(k) => ConceptKind::from_str(k).unwrap_or_else(|| {
            tracing::warn!(kind = k, "unknown concept kind, using vocabulary");
            ConceptKind::Vocabulary
        }),
    }
}

// Adds questions whose normalized prompt is not in `known`
fn add_new_questions(
    db: &Database,
    concept_id: i64,
    mut known: HashSet<String>,
    questions: &[QuestionImport],
) -> Result<usize> {
    let mut added = 0;
    for q in questions {
        let key = normalize(&q.prompt);
        if key.is_empty() || q.answer.trim().is_empty() {
            tracing::warn!(concept_id, "skipped question with empty prompt or answer");
            continue;
        }
        let question_type = match q.question_type.as_deref() {
            None => QuestionType::Translation,
            Some(t) => match QuestionType::from_str(t) {
                Some(t) => t,
                None => {
                    tracing::warn!(concept_id, question_type = t, "skipped question of unknown type");
                    continue;
                }
            },
        };
        if !known.insert(key) {
            continue;
        }
        db.add_question(concept_id, question_type, &q.prompt, &q.answer, &q.choices)?;
        added += 1;
    }
    Ok(added)
}
