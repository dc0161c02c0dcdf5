//! Practice sessions: queue, cards, grading and persistence in one loop.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::db::{Database, PracticeRecord};
use crate::error::{Error, Result};
use crate::grading::{check_answer, AnswerMatch};
use crate::models::{
    timestamp, ConceptWithProgress, Grade, MasteryState, PracticeMode, PracticeSession,
    QuestionType,
};
use crate::queue::{drill_queue, review_queue, QueueLimits};
use crate::srs::{ScheduleUpdate, SrsCalculator};

/// One prompt shown to the learner
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub concept_id: i64,
    pub term: String,
    /// `None` when the card was built from the concept itself
    pub question_id: Option<i64>,
    pub question_type: QuestionType,
    pub prompt: String,
    pub answer: String,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub concept_id: i64,
    /// Absent for self-graded cards
    pub verdict: Option<AnswerMatch>,
    pub quality: u8,
    pub correct: bool,
    pub expected: String,
    pub state: MasteryState,
    pub mastery_level: f64,
    pub interval_days: i64,
    pub next_review: String,
    pub lapse: bool,
    pub requeued: bool,
}

impl Feedback {
    pub fn message(&self) -> &'static str {
        match self.verdict {
            Some(verdict) => verdict.message(),
            None if self.correct => "Recorded.",
            None => "Recorded, it will come back soon.",
        }
    }
}

pub struct PracticeEngine<'a> {
    db: &'a Database,
    calc: &'a SrsCalculator,
    mode: PracticeMode,
    session_id: i64,
    queue: VecDeque<ConceptWithProgress>,
    requeue_failed: bool,
    requeued: HashSet<i64>,
}

impl<'a> PracticeEngine<'a> {
    pub fn start(
        db: &'a Database,
        calc: &'a SrsCalculator,
        session: &SessionConfig,
        mode: PracticeMode,
        course_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let items = db.list_with_progress(course_id)?;
        let queue: VecDeque<ConceptWithProgress> = match mode {
            PracticeMode::Review => review_queue(
                calc,
                items,
                now,
                QueueLimits {
                    review_limit: session.review_limit,
                    new_limit: session.new_limit,
                },
            )
            .into_iter()
            .map(|e| e.item)
            .collect(),
            PracticeMode::Drill => drill_queue(calc, items, session.drill_limit)
                .into_iter()
                .map(|e| e.item)
                .collect(),
        };

        let session_id = db.start_session(mode, course_id)?;
        tracing::info!(session_id, cards = queue.len(), mode = mode.as_str(), "practice queue ready");

        Ok(Self {
            db,
            calc,
            mode,
            session_id,
            queue,
            requeue_failed: session.requeue_failed && mode == PracticeMode::Review,
            requeued: HashSet::new(),
        })
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn next_card<R: Rng>(&mut self, rng: &mut R) -> Result<Option<Card>> {
        let Some(item) = self.queue.pop_front() else {
            return Ok(None);
        };
        let questions = self.db.list_questions(item.concept.id)?;
        let concept = item.concept;

        let card = match questions.choose(rng) {
            Some(q) => {
                let mut choices = q.choices.clone();
                if q.question_type == QuestionType::MultipleChoice {
                    if !choices.iter().any(|c| c == &q.answer) {
                        choices.push(q.answer.clone());
                    }
                    choices.shuffle(rng);
                }
                Card {
                    concept_id: concept.id,
                    term: concept.term,
                    question_id: Some(q.id),
                    question_type: q.question_type,
                    prompt: q.prompt.clone(),
                    answer: q.answer.clone(),
                    choices,
                }
            }
            // No authored questions: ask for the term from its translation
            None if !concept.translation.is_empty() => Card {
                concept_id: concept.id,
                prompt: format!("Translate into Polish: {}", concept.translation),
                answer: concept.term.clone(),
                term: concept.term,
                question_id: None,
                question_type: QuestionType::Translation,
                choices: Vec::new(),
            },
            None => Card {
                concept_id: concept.id,
                prompt: format!("Write out: {}", concept.term),
                answer: concept.term.clone(),
                term: concept.term,
                question_id: None,
                question_type: QuestionType::Translation,
                choices: Vec::new(),
            },
        };
        Ok(Some(card))
    }

    /// Check a typed answer and record the result
    pub fn submit(
        &mut self,
        card: &Card,
        answer: &str,
        hint_used: bool,
        now: DateTime<Utc>,
    ) -> Result<Feedback> {
        let verdict = check_answer(answer, &card.answer);
        let quality = verdict.quality(hint_used);
        self.record(card, quality, Some(verdict), Some(answer), now)
    }

    /// Record a self-assessed grade for a card
    pub fn grade(&mut self, card: &Card, grade: Grade, now: DateTime<Utc>) -> Result<Feedback> {
        self.record(card, grade.quality(), None, None, now)
    }

    fn record(
        &mut self,
        card: &Card,
        quality: u8,
        verdict: Option<AnswerMatch>,
        answer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Feedback> {
        let progress = self
            .db
            .get_progress(card.concept_id)?
            .ok_or_else(|| Error::not_found("concept", card.concept_id))?;

        let update: ScheduleUpdate = match self.mode {
            PracticeMode::Review => self.calc.schedule(&progress, quality, now),
            PracticeMode::Drill => self.calc.drill(&progress, quality, now),
        };

        let record = PracticeRecord {
            session_id: Some(self.session_id),
            concept_id: card.concept_id,
            question_id: card.question_id,
            mode: self.mode,
            quality,
            answer,
        };
        self.db.record_practice(&record, &update)?;

        let requeued = !update.correct
            && self.requeue_failed
            && self.requeued.insert(card.concept_id);
        if requeued {
            if let Some(item) = self.db.get_concept_with_progress(card.concept_id)? {
                self.queue.push_back(item);
            }
        }

        Ok(Feedback {
            concept_id: card.concept_id,
            verdict,
            quality,
            correct: update.correct,
            expected: card.answer.clone(),
            state: update.state,
            mastery_level: update.mastery_level,
            interval_days: update.interval_days,
            next_review: timestamp(update.next_review),
            lapse: update.lapse,
            requeued,
        })
    }

    pub fn finish(&self) -> Result<PracticeSession> {
        self.db.end_session(self.session_id)?;
        let session = self
            .db
            .get_session(self.session_id)?
            .ok_or_else(|| Error::not_found("session", self.session_id))?;
        tracing::info!(
            session_id = session.id,
            attempts = session.attempts,
            correct = session.correct,
            "finished practice session"
        );
        Ok(session)
    }
}
