use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, Row};
use serde::Serialize;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    timestamp, Concept, ConceptKind, ConceptWithProgress, Course, MasteryState, PracticeAttempt,
    PracticeMode, PracticeSession, Progress, Question, QuestionType,
};
use crate::srs::ScheduleUpdate;

const CONCEPT_COLUMNS: &str =
    "c.id, c.course_id, c.term, c.translation, c.kind, c.notes, c.created_at, c.updated_at";
const PROGRESS_COLUMNS: &str = "p.id, p.concept_id, p.state, p.mastery_level, p.ease_factor, \
     p.interval_days, p.repetitions, p.times_practiced, p.times_correct, p.lapses, \
     p.last_practiced, p.next_review";
const CONCEPT_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            base_ms: 25,
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Run a write, retrying busy/locked failures with exponential backoff.
pub fn retry_busy<T>(
    policy: RetryPolicy,
    mut op: impl FnMut() -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if is_busy(&e) && attempt < policy.retries => {
                let delay = policy.base_ms.saturating_mul(1 << attempt.min(16));
                tracing::warn!(attempt = attempt + 1, delay_ms = delay, "database busy, retrying write");
                thread::sleep(Duration::from_millis(delay));
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Fields for a concept about to be created
#[derive(Debug, Clone)]
pub struct NewConcept<'a> {
    pub course_id: Option<i64>,
    pub term: &'a str,
    pub translation: &'a str,
    pub kind: ConceptKind,
    pub notes: Option<&'a str>,
}

/// One graded attempt about to be stored
#[derive(Debug, Clone)]
pub struct PracticeRecord<'a> {
    pub session_id: Option<i64>,
    pub concept_id: i64,
    pub question_id: Option<i64>,
    pub mode: PracticeMode,
    pub quality: u8,
    pub answer: Option<&'a str>,
}

pub struct Database {
    conn: Connection,
    retry: RetryPolicy,
    initial_ease: f64,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            retry: RetryPolicy::default(),
            initial_ease: 2.5,
        })
    }

    pub fn configure(mut self, config: &Config) -> Self {
        self.retry = RetryPolicy {
            retries: config.storage.busy_retries,
            base_ms: config.storage.retry_base_ms,
        };
        self.initial_ease = config.srs.initial_ease;
        self
    }

    fn write<T>(&self, mut op: impl FnMut(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        Ok(retry_busy(self.retry, || op(&self.conn))?)
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS concepts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER,
                term TEXT NOT NULL,
                translation TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL DEFAULT 'vocabulary' CHECK(kind IN ('vocabulary', 'grammar')),
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (course_id, term),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                concept_id INTEGER NOT NULL,
                question_type TEXT NOT NULL CHECK(question_type IN ('translation', 'fill_blank', 'multiple_choice')),
                prompt TEXT NOT NULL,
                answer TEXT NOT NULL,
                choices TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (concept_id) REFERENCES concepts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                concept_id INTEGER NOT NULL UNIQUE,
                state TEXT NOT NULL DEFAULT 'new' CHECK(state IN ('new', 'learning', 'reviewing', 'mastered')),
                mastery_level REAL NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 0,
                repetitions INTEGER NOT NULL DEFAULT 0,
                times_practiced INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                last_practiced TEXT,
                next_review TEXT,
                FOREIGN KEY (concept_id) REFERENCES concepts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS practice_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mode TEXT NOT NULL CHECK(mode IN ('review', 'drill')),
                course_id INTEGER,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                correct INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS practice_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER,
                concept_id INTEGER NOT NULL,
                question_id INTEGER,
                mode TEXT NOT NULL CHECK(mode IN ('review', 'drill')),
                quality INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                answer TEXT,
                practiced_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES practice_sessions(id) ON DELETE SET NULL,
                FOREIGN KEY (concept_id) REFERENCES concepts(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_concepts_course ON concepts(course_id);
            CREATE INDEX IF NOT EXISTS idx_questions_concept ON questions(concept_id);
            CREATE INDEX IF NOT EXISTS idx_progress_next_review ON progress(next_review);
            CREATE INDEX IF NOT EXISTS idx_progress_state ON progress(state);
            CREATE INDEX IF NOT EXISTS idx_attempts_concept ON practice_attempts(concept_id);
            CREATE INDEX IF NOT EXISTS idx_attempts_session ON practice_attempts(session_id);
            "#,
        )?;

        self.migrate()?;
        Ok(())
    }

    // Columns added after the first release
    fn migrate(&self) -> Result<()> {
        let has_lapses = self
            .conn
            .prepare("SELECT lapses FROM progress LIMIT 1")
            .is_ok();

        if !has_lapses {
            self.conn.execute_batch(
                "ALTER TABLE progress ADD COLUMN lapses INTEGER NOT NULL DEFAULT 0;",
            )?;
        }

        Ok(())
    }

    // Course operations
    pub fn add_course(&self, title: &str, description: Option<&str>) -> Result<i64> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid("course title must not be empty"));
        }
        let now = timestamp(Utc::now());
        let id = self.write(|conn| {
            conn.execute(
                "INSERT INTO courses (title, description, created_at) VALUES (?1, ?2, ?3)",
                params![title, description, now],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::info!(course_id = id, title, "added course");
        Ok(id)
    }

    fn course_from_row(row: &Row) -> rusqlite::Result<Course> {
        Ok(Course {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
            concept_count: row.get(4)?,
        })
    }

    const COURSE_QUERY: &'static str = r#"
        SELECT co.id, co.title, co.description, co.created_at, COUNT(c.id)
        FROM courses co
        LEFT JOIN concepts c ON c.course_id = co.id
    "#;

    pub fn get_course(&self, id: i64) -> Result<Option<Course>> {
        let query = format!("{} WHERE co.id = ?1 GROUP BY co.id", Self::COURSE_QUERY);
        match self
            .conn
            .query_row(&query, params![id], Self::course_from_row)
        {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_course_by_title(&self, title: &str) -> Result<Option<Course>> {
        let query = format!("{} WHERE co.title = ?1 GROUP BY co.id", Self::COURSE_QUERY);
        match self
            .conn
            .query_row(&query, params![title.trim()], Self::course_from_row)
        {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_courses(&self) -> Result<Vec<Course>> {
        let query = format!("{} GROUP BY co.id ORDER BY co.title", Self::COURSE_QUERY);
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map([], Self::course_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Concept operations
    pub fn add_concept(&self, new: &NewConcept) -> Result<i64> {
        let term = new.term.trim();
        if term.is_empty() {
            return Err(Error::invalid("concept term must not be empty"));
        }
        let now = timestamp(Utc::now());
        let initial_ease = self.initial_ease;

        let id = self.write(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO concepts (course_id, term, translation, kind, notes, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
                params![
                    new.course_id,
                    term,
                    new.translation.trim(),
                    new.kind.as_str(),
                    new.notes,
                    now
                ],
            )?;
            let concept_id = tx.last_insert_rowid();

            // Every concept starts with an unscheduled progress row
            tx.execute(
                "INSERT INTO progress (concept_id, ease_factor) VALUES (?1, ?2)",
                params![concept_id, initial_ease],
            )?;
            tx.commit()?;
            Ok(concept_id)
        })?;

        tracing::info!(concept_id = id, term, "added concept");
        Ok(id)
    }

    fn concept_from_row(row: &Row, base: usize) -> rusqlite::Result<Concept> {
        let kind: String = row.get(base + 4)?;
        Ok(Concept {
            id: row.get(base)?,
            course_id: row.get(base + 1)?,
            term: row.get(base + 2)?,
            translation: row.get(base + 3)?,
            kind: ConceptKind::from_str(&kind).unwrap_or(ConceptKind::Vocabulary),
            notes: row.get(base + 5)?,
            created_at: row.get(base + 6)?,
            updated_at: row.get(base + 7)?,
        })
    }

    fn progress_from_row(row: &Row, base: usize) -> rusqlite::Result<Progress> {
        let state: String = row.get(base + 2)?;
        Ok(Progress {
            id: row.get(base)?,
            concept_id: row.get(base + 1)?,
            state: MasteryState::from_str(&state).unwrap_or(MasteryState::New),
            mastery_level: row.get(base + 3)?,
            ease_factor: row.get(base + 4)?,
            interval_days: row.get(base + 5)?,
            repetitions: row.get(base + 6)?,
            times_practiced: row.get(base + 7)?,
            times_correct: row.get(base + 8)?,
            lapses: row.get(base + 9)?,
            last_practiced: row.get(base + 10)?,
            next_review: row.get(base + 11)?,
        })
    }

    fn concept_with_progress_from_row(row: &Row) -> rusqlite::Result<ConceptWithProgress> {
        Ok(ConceptWithProgress {
            concept: Self::concept_from_row(row, 0)?,
            progress: Self::progress_from_row(row, CONCEPT_WIDTH)?,
        })
    }

    pub fn get_concept(&self, id: i64) -> Result<Option<Concept>> {
        let query = format!("SELECT {} FROM concepts c WHERE c.id = ?1", CONCEPT_COLUMNS);
        match self
            .conn
            .query_row(&query, params![id], |row| Self::concept_from_row(row, 0))
        {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_concept_with_progress(&self, id: i64) -> Result<Option<ConceptWithProgress>> {
        let query = format!(
            "SELECT {}, {} FROM concepts c JOIN progress p ON p.concept_id = c.id WHERE c.id = ?1",
            CONCEPT_COLUMNS, PROGRESS_COLUMNS
        );
        match self
            .conn
            .query_row(&query, params![id], Self::concept_with_progress_from_row)
        {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_concepts(
        &self,
        course_id: Option<i64>,
        state: Option<MasteryState>,
    ) -> Result<Vec<ConceptWithProgress>> {
        let mut query = format!(
            "SELECT {}, {} FROM concepts c JOIN progress p ON p.concept_id = c.id",
            CONCEPT_COLUMNS, PROGRESS_COLUMNS
        );
        let mut clauses = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(course) = course_id {
            params_vec.push(Box::new(course));
            clauses.push(format!("c.course_id = ?{}", params_vec.len()));
        }
        if let Some(state) = state {
            params_vec.push(Box::new(state.as_str()));
            clauses.push(format!("p.state = ?{}", params_vec.len()));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY c.id");

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::concept_with_progress_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Everything the queue builders need for one course, or for all of them
    pub fn list_with_progress(&self, course_id: Option<i64>) -> Result<Vec<ConceptWithProgress>> {
        self.list_concepts(course_id, None)
    }

    pub fn delete_concept(&self, id: i64) -> Result<bool> {
        let rows = self.write(|conn| conn.execute("DELETE FROM concepts WHERE id = ?1", params![id]))?;
        if rows > 0 {
            tracing::info!(concept_id = id, "deleted concept");
        }
        Ok(rows > 0)
    }

    /// Overwrite translation and/or notes; `None` leaves a field unchanged
    pub fn update_concept_details(
        &self,
        id: i64,
        translation: Option<&str>,
        notes: Option<&str>,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        let rows = self.write(|conn| {
            conn.execute(
                r#"
                UPDATE concepts
                SET translation = COALESCE(?1, translation),
                    notes = COALESCE(?2, notes),
                    updated_at = ?3
                WHERE id = ?4
                "#,
                params![translation, notes, now, id],
            )
        })?;
        if rows == 0 {
            return Err(Error::not_found("concept", id));
        }
        Ok(())
    }

    // Question operations
    pub fn add_question(
        &self,
        concept_id: i64,
        question_type: QuestionType,
        prompt: &str,
        answer: &str,
        choices: &[String],
    ) -> Result<i64> {
        if prompt.trim().is_empty() || answer.trim().is_empty() {
            return Err(Error::invalid("question prompt and answer must not be empty"));
        }
        if self.get_concept(concept_id)?.is_none() {
            return Err(Error::not_found("concept", concept_id));
        }
        let choices_json = serde_json::to_string(choices)?;
        let now = timestamp(Utc::now());

        let id = self.write(|conn| {
            conn.execute(
                r#"
                INSERT INTO questions (concept_id, question_type, prompt, answer, choices, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    concept_id,
                    question_type.as_str(),
                    prompt.trim(),
                    answer.trim(),
                    choices_json,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::info!(question_id = id, concept_id, "added question");
        Ok(id)
    }

    fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
        let question_type: String = row.get(2)?;
        let choices: String = row.get(5)?;
        Ok(Question {
            id: row.get(0)?,
            concept_id: row.get(1)?,
            question_type: QuestionType::from_str(&question_type)
                .unwrap_or(QuestionType::Translation),
            prompt: row.get(3)?,
            answer: row.get(4)?,
            choices: serde_json::from_str(&choices).unwrap_or_default(),
            created_at: row.get(6)?,
        })
    }

    pub fn get_question(&self, id: i64) -> Result<Option<Question>> {
        match self.conn.query_row(
            r#"
            SELECT id, concept_id, question_type, prompt, answer, choices, created_at
            FROM questions
            WHERE id = ?1
            "#,
            params![id],
            Self::question_from_row,
        ) {
            Ok(q) => Ok(Some(q)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_questions(&self, concept_id: i64) -> Result<Vec<Question>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, concept_id, question_type, prompt, answer, choices, created_at
            FROM questions
            WHERE concept_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![concept_id], Self::question_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Progress operations
    pub fn get_progress(&self, concept_id: i64) -> Result<Option<Progress>> {
        let query = format!("SELECT {} FROM progress p WHERE p.concept_id = ?1", PROGRESS_COLUMNS);
        match self
            .conn
            .query_row(&query, params![concept_id], |row| Self::progress_from_row(row, 0))
        {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_progress(
        conn: &Connection,
        concept_id: i64,
        update: &ScheduleUpdate,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            UPDATE progress
            SET state = ?1,
                mastery_level = ?2,
                ease_factor = ?3,
                interval_days = ?4,
                repetitions = ?5,
                times_practiced = ?6,
                times_correct = ?7,
                lapses = ?8,
                last_practiced = ?9,
                next_review = ?10
            WHERE concept_id = ?11
            "#,
            params![
                update.state.as_str(),
                update.mastery_level,
                update.ease_factor,
                update.interval_days,
                update.repetitions,
                update.times_practiced,
                update.times_correct,
                update.lapses,
                timestamp(update.last_practiced),
                timestamp(update.next_review),
                concept_id
            ],
        )
    }

    // Practice session operations
    pub fn start_session(&self, mode: PracticeMode, course_id: Option<i64>) -> Result<i64> {
        let now = timestamp(Utc::now());
        let id = self.write(|conn| {
            conn.execute(
                "INSERT INTO practice_sessions (mode, course_id, started_at) VALUES (?1, ?2, ?3)",
                params![mode.as_str(), course_id, now],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::info!(session_id = id, mode = mode.as_str(), "started practice session");
        Ok(id)
    }

    pub fn end_session(&self, session_id: i64) -> Result<()> {
        let now = timestamp(Utc::now());
        let rows = self.write(|conn| {
            conn.execute(
                "UPDATE practice_sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
                params![now, session_id],
            )
        })?;
        if rows == 0 && self.get_session(session_id)?.is_none() {
            return Err(Error::not_found("session", session_id));
        }
        Ok(())
    }

    fn session_from_row(row: &Row) -> rusqlite::Result<PracticeSession> {
        let mode: String = row.get(1)?;
        Ok(PracticeSession {
            id: row.get(0)?,
            mode: PracticeMode::from_str(&mode).unwrap_or(PracticeMode::Review),
            course_id: row.get(2)?,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
            attempts: row.get(5)?,
            correct: row.get(6)?,
        })
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<PracticeSession>> {
        match self.conn.query_row(
            r#"
            SELECT id, mode, course_id, started_at, ended_at, attempts, correct
            FROM practice_sessions
            WHERE id = ?1
            "#,
            params![session_id],
            Self::session_from_row,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, mode, course_id, started_at, ended_at, attempts, correct
            FROM practice_sessions
            ORDER BY started_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::session_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Store an attempt, its schedule update and the session counters atomically.
    pub fn record_practice(&self, record: &PracticeRecord, update: &ScheduleUpdate) -> Result<i64> {
        let practiced_at = timestamp(update.last_practiced);

        let attempt_id = self.write(|conn| {
            let tx = conn.unchecked_transaction()?;

            // Progress first: a missing row means a missing concept, caught
            // before the attempt's foreign key can fail
            if Self::write_progress(&tx, record.concept_id, update)? == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }

            tx.execute(
                r#"
                INSERT INTO practice_attempts
                    (session_id, concept_id, question_id, mode, quality, correct, answer, practiced_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    record.session_id,
                    record.concept_id,
                    record.question_id,
                    record.mode.as_str(),
                    record.quality,
                    update.correct,
                    record.answer,
                    practiced_at
                ],
            )?;
            let attempt_id = tx.last_insert_rowid();

            if let Some(session_id) = record.session_id {
                tx.execute(
                    r#"
                    UPDATE practice_sessions
                    SET attempts = attempts + 1,
                        correct = correct + ?1
                    WHERE id = ?2
                    "#,
                    params![i32::from(update.correct), session_id],
                )?;
            }

            tx.commit()?;
            Ok(attempt_id)
        });

        let attempt_id = match attempt_id {
            Err(Error::Database(rusqlite::Error::QueryReturnedNoRows)) => {
                return Err(Error::not_found("concept", record.concept_id))
            }
            other => other?,
        };

        tracing::info!(
            attempt_id,
            concept_id = record.concept_id,
            quality = record.quality,
            correct = update.correct,
            state = update.state.as_str(),
            "recorded practice"
        );
        Ok(attempt_id)
    }

    pub fn list_attempts(&self, concept_id: i64, limit: usize) -> Result<Vec<PracticeAttempt>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, concept_id, question_id, mode, quality, correct, answer, practiced_at
            FROM practice_attempts
            WHERE concept_id = ?1
            ORDER BY practiced_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![concept_id, limit as i64], |row| {
            let mode: String = row.get(4)?;
            Ok(PracticeAttempt {
                id: row.get(0)?,
                session_id: row.get(1)?,
                concept_id: row.get(2)?,
                question_id: row.get(3)?,
                mode: PracticeMode::from_str(&mode).unwrap_or(PracticeMode::Review),
                quality: row.get(5)?,
                correct: row.get::<_, i32>(6)? != 0,
                answer: row.get(7)?,
                practiced_at: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_stats(&self, now: DateTime<Utc>, overdue_cutoff: DateTime<Utc>) -> Result<Stats> {
        let count = |sql: &str| -> rusqlite::Result<i64> {
            self.conn.query_row(sql, [], |row| row.get(0))
        };

        let total_concepts = count("SELECT COUNT(*) FROM concepts")?;
        let total_questions = count("SELECT COUNT(*) FROM questions")?;
        let total_attempts = count("SELECT COUNT(*) FROM practice_attempts")?;
        let correct_attempts = count("SELECT COUNT(*) FROM practice_attempts WHERE correct = 1")?;
        let sessions = count("SELECT COUNT(*) FROM practice_sessions")?;

        let mut stats = Stats {
            total_concepts,
            total_questions,
            total_attempts,
            correct_attempts,
            sessions,
            ..Stats::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM progress GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (state, n) = row?;
            match MasteryState::from_str(&state) {
                Some(MasteryState::New) => stats.new = n,
                Some(MasteryState::Learning) => stats.learning = n,
                Some(MasteryState::Reviewing) => stats.reviewing = n,
                Some(MasteryState::Mastered) => stats.mastered = n,
                None => {}
            }
        }

        stats.due_now = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM progress
            WHERE times_practiced > 0 AND next_review IS NOT NULL AND next_review <= ?1
            "#,
            params![timestamp(now)],
            |row| row.get(0),
        )?;
        stats.overdue = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM progress
            WHERE times_practiced > 0 AND next_review IS NOT NULL AND next_review <= ?1
            "#,
            params![timestamp(overdue_cutoff)],
            |row| row.get(0),
        )?;
        stats.avg_mastery = self.conn.query_row(
            "SELECT COALESCE(AVG(mastery_level), 0) FROM progress",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total_concepts: i64,
    pub total_questions: i64,
    pub new: i64,
    pub learning: i64,
    pub reviewing: i64,
    pub mastered: i64,
    pub due_now: i64,
    pub overdue: i64,
    pub total_attempts: i64,
    pub correct_attempts: i64,
    pub sessions: i64,
    pub avg_mastery: f64,
}

impl Stats {
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            (self.correct_attempts as f64 / self.total_attempts as f64) * 100.0
        }
    }
}
