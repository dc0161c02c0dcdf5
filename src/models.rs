// Several accessors exist for the JSON output and the dashboard only
#![allow(dead_code)]

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Canonical storage format for timestamps: RFC 3339, UTC, second precision.
/// Keeping one format means string order matches time order in SQL.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub concept_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConceptKind {
    Vocabulary,
    Grammar,
}

impl ConceptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptKind::Vocabulary => "vocabulary",
            ConceptKind::Grammar => "grammar",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vocabulary" | "vocab" | "word" | "v" => Some(ConceptKind::Vocabulary),
            "grammar" | "rule" | "g" => Some(ConceptKind::Grammar),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConceptKind::Vocabulary => "Vocabulary",
            ConceptKind::Grammar => "Grammar",
        }
    }
}

// A vocabulary word or grammar rule tracked independently for mastery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: i64,
    pub course_id: Option<i64>,
    pub term: String,
    pub translation: String,
    pub kind: ConceptKind,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    Translation,
    FillBlank,
    MultipleChoice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Translation => "translation",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::MultipleChoice => "multiple_choice",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "translation" | "translate" | "t" => Some(QuestionType::Translation),
            "fill_blank" | "fill-blank" | "blank" | "cloze" | "f" => Some(QuestionType::FillBlank),
            "multiple_choice" | "multiple-choice" | "choice" | "mc" | "m" => {
                Some(QuestionType::MultipleChoice)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub concept_id: i64,
    pub question_type: QuestionType,
    pub prompt: String,
    pub answer: String,
    pub choices: Vec<String>,
    pub created_at: String,
}

/// Lifecycle stage of a concept, derived from its practice history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MasteryState {
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl MasteryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryState::New => "new",
            MasteryState::Learning => "learning",
            MasteryState::Reviewing => "reviewing",
            MasteryState::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" | "n" => Some(MasteryState::New),
            "learning" | "l" => Some(MasteryState::Learning),
            "reviewing" | "review" | "r" => Some(MasteryState::Reviewing),
            "mastered" | "m" => Some(MasteryState::Mastered),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MasteryState::New => "New",
            MasteryState::Learning => "Learning",
            MasteryState::Reviewing => "Reviewing",
            MasteryState::Mastered => "Mastered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub id: i64,
    pub concept_id: i64,
    pub state: MasteryState,
    pub mastery_level: f64,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i32,
    pub times_practiced: i32,
    pub times_correct: i32,
    pub lapses: i32,
    pub last_practiced: Option<String>,
    pub next_review: Option<String>,
}

impl Progress {
    /// Fresh progress for a concept that has never been practiced.
    pub fn new(concept_id: i64, initial_ease: f64) -> Self {
        Self {
            id: 0,
            concept_id,
            state: MasteryState::New,
            mastery_level: 0.0,
            ease_factor: initial_ease,
            interval_days: 0,
            repetitions: 0,
            times_practiced: 0,
            times_correct: 0,
            lapses: 0,
            last_practiced: None,
            next_review: None,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.times_practiced == 0 {
            0.0
        } else {
            (self.times_correct as f64 / self.times_practiced as f64) * 100.0
        }
    }

    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        self.next_review.as_deref().and_then(parse_timestamp)
    }

    pub fn last_practiced_at(&self) -> Option<DateTime<Utc>> {
        self.last_practiced.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptWithProgress {
    pub concept: Concept,
    pub progress: Progress,
}

/// Self-assessed recall grade, mapped onto SM-2 quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "again" | "a" | "fail" | "no" | "1" => Some(Grade::Again),
            "hard" | "h" | "2" => Some(Grade::Hard),
            "good" | "g" | "ok" | "yes" | "3" => Some(Grade::Good),
            "easy" | "e" | "4" => Some(Grade::Easy),
            _ => None,
        }
    }

    pub fn quality(&self) -> u8 {
        match self {
            Grade::Again => 1,
            Grade::Hard => 3,
            Grade::Good => 4,
            Grade::Easy => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PracticeMode {
    Review,
    Drill,
}

impl PracticeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeMode::Review => "review",
            PracticeMode::Drill => "drill",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "review" | "r" => Some(PracticeMode::Review),
            "drill" | "d" => Some(PracticeMode::Drill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: i64,
    pub mode: PracticeMode,
    pub course_id: Option<i64>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub attempts: i32,
    pub correct: i32,
}

impl PracticeSession {
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.correct as f64 / self.attempts as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeAttempt {
    pub id: i64,
    pub session_id: Option<i64>,
    pub concept_id: i64,
    pub question_id: Option<i64>,
    pub mode: PracticeMode,
    pub quality: u8,
    pub correct: bool,
    pub answer: Option<String>,
    pub practiced_at: String,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    mod timestamp_tests {
        use super::*;

        #[test]
        fn timestamp_uses_z_suffix_and_seconds() {
            let dt = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
            assert_eq!(timestamp(dt), "2024-03-05T07:08:09Z");
        }

        #[test]
        fn parse_timestamp_round_trips() {
            let dt = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
            assert_eq!(parse_timestamp(&timestamp(dt)), Some(dt));
        }

        #[test]
        fn parse_timestamp_accepts_offsets() {
            let parsed = parse_timestamp("2024-03-05T09:08:09+02:00").unwrap();
            assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap());
        }

        #[test]
        fn parse_timestamp_rejects_garbage() {
            assert!(parse_timestamp("yesterday").is_none());
            assert!(parse_timestamp("").is_none());
        }

        #[test]
        fn string_order_matches_time_order() {
            let earlier = timestamp(Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap());
            let later = timestamp(Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap());
            assert!(earlier < later);
        }
    }

    mod progress_tests {
        use super::*;

        fn make_progress(times_practiced: i32, times_correct: i32) -> Progress {
            Progress {
                times_practiced,
                times_correct,
                ..Progress::new(1, 2.5)
            }
        }

        #[test]
        fn new_progress_is_unscheduled() {
            let p = Progress::new(7, 2.5);
            assert_eq!(p.concept_id, 7);
            assert_eq!(p.state, MasteryState::New);
            assert_eq!(p.ease_factor, 2.5);
            assert!(p.next_review_at().is_none());
            assert!(p.last_practiced_at().is_none());
        }

        #[test]
        fn success_rate_zero_attempts() {
            assert_eq!(make_progress(0, 0).success_rate(), 0.0);
        }

        #[test]
        fn success_rate_partial() {
            assert_eq!(make_progress(4, 3).success_rate(), 75.0);
        }

        #[test]
        fn success_rate_all_correct() {
            assert_eq!(make_progress(10, 10).success_rate(), 100.0);
        }
    }

    mod grade_tests {
        use super::*;

        #[test]
        fn quality_mapping() {
            assert_eq!(Grade::Again.quality(), 1);
            assert_eq!(Grade::Hard.quality(), 3);
            assert_eq!(Grade::Good.quality(), 4);
            assert_eq!(Grade::Easy.quality(), 5);
        }

        #[test]
        fn from_str_variants() {
            for v in ["again", "a", "FAIL", "1"] {
                assert_eq!(Grade::from_str(v), Some(Grade::Again), "'{}'", v);
            }
            for v in ["hard", "H", "2"] {
                assert_eq!(Grade::from_str(v), Some(Grade::Hard), "'{}'", v);
            }
            for v in ["good", "g", "Ok", "3"] {
                assert_eq!(Grade::from_str(v), Some(Grade::Good), "'{}'", v);
            }
            for v in ["easy", "E", "4"] {
                assert_eq!(Grade::from_str(v), Some(Grade::Easy), "'{}'", v);
            }
        }

        #[test]
        fn from_str_invalid() {
            assert!(Grade::from_str("").is_none());
            assert!(Grade::from_str("5").is_none());
            assert!(Grade::from_str("perfect").is_none());
        }
    }

    mod enum_string_tests {
        use super::*;

        #[test]
        fn mastery_state_round_trips() {
            for state in [
                MasteryState::New,
                MasteryState::Learning,
                MasteryState::Reviewing,
                MasteryState::Mastered,
            ] {
                assert_eq!(MasteryState::from_str(state.as_str()), Some(state));
            }
            assert!(MasteryState::from_str("forgotten").is_none());
        }

        #[test]
        fn mastery_state_orders_by_progress() {
            assert!(MasteryState::New < MasteryState::Learning);
            assert!(MasteryState::Reviewing < MasteryState::Mastered);
        }

        #[test]
        fn concept_kind_aliases() {
            assert_eq!(ConceptKind::from_str("vocab"), Some(ConceptKind::Vocabulary));
            assert_eq!(ConceptKind::from_str("Rule"), Some(ConceptKind::Grammar));
            assert!(ConceptKind::from_str("idiom").is_none());
        }

        #[test]
        fn question_type_aliases() {
            assert_eq!(QuestionType::from_str("cloze"), Some(QuestionType::FillBlank));
            assert_eq!(QuestionType::from_str("MC"), Some(QuestionType::MultipleChoice));
            assert_eq!(
                QuestionType::from_str(QuestionType::Translation.as_str()),
                Some(QuestionType::Translation)
            );
            assert!(QuestionType::from_str("essay").is_none());
        }

        #[test]
        fn practice_mode_round_trips() {
            assert_eq!(PracticeMode::from_str("review"), Some(PracticeMode::Review));
            assert_eq!(PracticeMode::from_str("DRILL"), Some(PracticeMode::Drill));
            assert!(PracticeMode::from_str("cram").is_none());
        }
    }

    mod session_tests {
        use super::*;

        #[test]
        fn accuracy_handles_empty_session() {
            let s = PracticeSession {
                id: 1,
                mode: PracticeMode::Review,
                course_id: None,
                started_at: String::new(),
                ended_at: None,
                attempts: 0,
                correct: 0,
            };
            assert_eq!(s.accuracy(), 0.0);
            let s = PracticeSession {
                attempts: 8,
                correct: 6,
                ..s
            };
            assert_eq!(s.accuracy(), 75.0);
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
