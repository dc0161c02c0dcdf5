//! Spaced-repetition scheduling.
//!
//! A SuperMemo 2 variant. Each concept carries an ease factor, an interval
//! and a streak of successful repetitions:
//! - quality 0-2: the streak resets and the interval decays to the relearn interval
//! - quality 3-5: the interval grows (first interval, second interval, then × ease)
//! - the ease factor moves after every attempt and stays within `[min_ease, max_ease]`
//!
//! On top of SM-2 the calculator keeps a mastery level (a moving average of
//! recall quality on a 0-100 scale) and a discrete mastery state, and derives
//! the priority and weakness scores used to order practice queues.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::{SrsConfig, MAX_INTERVAL_LIMIT};
use crate::models::{Grade, MasteryState, Progress};

pub const MAX_QUALITY: u8 = 5;
/// Lowest quality that counts as a correct recall
pub const PASSING_QUALITY: u8 = 3;

const OVERDUE_WEIGHT: f64 = 2.0;
const LAPSE_WEIGHT: f64 = 0.1;
const LAPSE_CAP: i32 = 5;
const WEAKNESS_FAILURE_WEIGHT: f64 = 0.6;
const WEAKNESS_MASTERY_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DueStatus {
    New,
    NotDue,
    Due,
    Overdue,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::New => "new",
            DueStatus::NotDue => "not_due",
            DueStatus::Due => "due",
            DueStatus::Overdue => "overdue",
        }
    }

    pub fn is_due(&self) -> bool {
        matches!(self, DueStatus::Due | DueStatus::Overdue)
    }
}

/// Complete progress state after one practice attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleUpdate {
    pub state: MasteryState,
    pub mastery_level: f64,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i32,
    pub times_practiced: i32,
    pub times_correct: i32,
    pub lapses: i32,
    pub last_practiced: DateTime<Utc>,
    pub next_review: DateTime<Utc>,
    pub correct: bool,
    pub lapse: bool,
}

#[cfg(test)]
impl ScheduleUpdate {
    pub fn apply(&self, progress: &mut Progress) {
        progress.state = self.state;
        progress.mastery_level = self.mastery_level;
        progress.ease_factor = self.ease_factor;
        progress.interval_days = self.interval_days;
        progress.repetitions = self.repetitions;
        progress.times_practiced = self.times_practiced;
        progress.times_correct = self.times_correct;
        progress.lapses = self.lapses;
        progress.last_practiced = Some(crate::models::timestamp(self.last_practiced));
        progress.next_review = Some(crate::models::timestamp(self.next_review));
    }
}

#[derive(Debug, Clone, Default)]
pub struct SrsCalculator {
    config: SrsConfig,
}

impl SrsCalculator {
    pub fn new(config: SrsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SrsConfig {
        &self.config
    }

    pub fn is_correct(quality: u8) -> bool {
        quality.min(MAX_QUALITY) >= PASSING_QUALITY
    }

    /// Review-mode update: moves ease, interval, streak, mastery and state.
    pub fn schedule(&self, progress: &Progress, quality: u8, now: DateTime<Utc>) -> ScheduleUpdate {
        let q = quality.min(MAX_QUALITY);
        let correct = Self::is_correct(q);
        let ease_factor = self.next_ease(progress.ease_factor, q);
        let mastery_level = self.next_mastery(progress.mastery_level, q);

        let (repetitions, interval_days) = if correct {
            let reps = progress.repetitions + 1;
            (reps, self.grow_interval(progress.interval_days, reps, ease_factor, q))
        } else {
            (0, self.relearn_days())
        };

        let lapse = !correct
            && matches!(
                progress.state,
                MasteryState::Reviewing | MasteryState::Mastered
            );
        let state = self.next_state(
            progress.state,
            correct,
            repetitions,
            mastery_level,
            interval_days,
        );

        tracing::debug!(
            concept_id = progress.concept_id,
            quality = q,
            from = progress.state.as_str(),
            to = state.as_str(),
            interval_days,
            ease_factor,
            "scheduled review"
        );

        ScheduleUpdate {
            state,
            mastery_level,
            ease_factor,
            interval_days,
            repetitions,
            times_practiced: progress.times_practiced + 1,
            times_correct: progress.times_correct + i32::from(correct),
            lapses: progress.lapses + i32::from(lapse),
            last_practiced: now,
            next_review: now + Duration::days(interval_days),
            correct,
            lapse,
        }
    }

    /// Drill-mode update: counters and mastery move, the SM-2 schedule does
    /// not. A failure pulls the next review forward to the relearn interval.
    pub fn drill(&self, progress: &Progress, quality: u8, now: DateTime<Utc>) -> ScheduleUpdate {
        let Some(next_review) = progress.next_review_at() else {
            // Never scheduled: the first attempt seeds the schedule
            return self.schedule(progress, quality, now);
        };

        let q = quality.min(MAX_QUALITY);
        let correct = Self::is_correct(q);
        let relearn_at = now + Duration::days(self.relearn_days());
        let next_review = if correct {
            next_review
        } else {
            next_review.min(relearn_at)
        };
        let state = if progress.state == MasteryState::New {
            MasteryState::Learning
        } else {
            progress.state
        };

        ScheduleUpdate {
            state,
            mastery_level: self.next_mastery(progress.mastery_level, q),
            ease_factor: progress.ease_factor,
            interval_days: progress.interval_days,
            repetitions: progress.repetitions,
            times_practiced: progress.times_practiced + 1,
            times_correct: progress.times_correct + i32::from(correct),
            lapses: progress.lapses,
            last_practiced: now,
            next_review,
            correct,
            lapse: false,
        }
    }

    /// SM-2 ease update: EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
    pub fn next_ease(&self, ease: f64, quality: u8) -> f64 {
        let miss = f64::from(MAX_QUALITY - quality.min(MAX_QUALITY));
        let updated = ease + (0.1 - miss * (0.08 + miss * 0.02));
        // max then min: an inverted range yields max_ease instead of a panic
        updated.max(self.config.min_ease).min(self.config.max_ease)
    }

    /// Exponential moving average toward the attempt's quality on a 0-100 scale.
    pub fn next_mastery(&self, level: f64, quality: u8) -> f64 {
        let target = f64::from(quality.min(MAX_QUALITY)) * 20.0;
        let alpha = self.config.mastery_alpha.clamp(0.0, 1.0);
        (level + alpha * (target - level)).clamp(0.0, 100.0)
    }

    pub fn next_state(
        &self,
        previous: MasteryState,
        correct: bool,
        repetitions: i32,
        mastery_level: f64,
        interval_days: i64,
    ) -> MasteryState {
        match (previous, correct) {
            (MasteryState::New, _) => MasteryState::Learning,
            (MasteryState::Learning, true) => {
                if repetitions >= self.config.graduate_repetitions {
                    MasteryState::Reviewing
                } else {
                    MasteryState::Learning
                }
            }
            (MasteryState::Reviewing, true) => {
                if mastery_level >= self.config.mastered_threshold
                    && interval_days >= self.config.mastered_min_interval_days
                {
                    MasteryState::Mastered
                } else {
                    MasteryState::Reviewing
                }
            }
            (MasteryState::Mastered, true) => MasteryState::Mastered,
            // Failures demote one step
            (MasteryState::Mastered, false) => MasteryState::Reviewing,
            (MasteryState::Reviewing, false) | (MasteryState::Learning, false) => {
                MasteryState::Learning
            }
        }
    }

    fn grow_interval(&self, previous: i64, repetitions: i32, ease: f64, quality: u8) -> i64 {
        let c = &self.config;
        let raw = match repetitions {
            1 => c.first_interval_days,
            2 => c.second_interval_days,
            _ => {
                let bonus = if quality == MAX_QUALITY { c.easy_bonus } else { 1.0 };
                (previous.max(1) as f64 * ease * bonus).round() as i64
            }
        };
        // Success never shrinks the interval
        raw.max(previous + 1).clamp(1, self.max_interval())
    }

    fn max_interval(&self) -> i64 {
        self.config.max_interval_days.clamp(1, MAX_INTERVAL_LIMIT)
    }

    /// Never longer than the longest allowed interval
    fn relearn_days(&self) -> i64 {
        self.config.relearn_interval_days.clamp(1, self.max_interval())
    }

    pub fn due_status(&self, progress: &Progress, now: DateTime<Utc>) -> DueStatus {
        let Some(next_review) = progress.next_review_at() else {
            return DueStatus::New;
        };
        if progress.times_practiced == 0 {
            return DueStatus::New;
        }
        if next_review > now {
            DueStatus::NotDue
        } else if now - next_review >= Duration::hours(self.config.overdue_after_hours) {
            DueStatus::Overdue
        } else {
            DueStatus::Due
        }
    }

    /// Urgency of a due concept: how far past due relative to its interval,
    /// plus how weakly it is known.
    pub fn priority(&self, progress: &Progress, now: DateTime<Utc>) -> f64 {
        let overdue_days = progress
            .next_review_at()
            .map(|next| (now - next).num_seconds() as f64 / 86_400.0)
            .unwrap_or(0.0)
            .max(0.0);
        let interval = progress.interval_days.max(1) as f64;
        let mastery_gap = 1.0 - (progress.mastery_level / 100.0).clamp(0.0, 1.0);
        let lapses = f64::from(progress.lapses.clamp(0, LAPSE_CAP));

        OVERDUE_WEIGHT * overdue_days / interval + mastery_gap + LAPSE_WEIGHT * lapses
    }

    /// Drill ranking score in `[0, 1]`: failure rate and missing mastery.
    pub fn weakness(&self, progress: &Progress) -> f64 {
        if progress.times_practiced == 0 {
            return 0.0;
        }
        let success = progress.times_correct as f64 / progress.times_practiced as f64;
        let mastery = (progress.mastery_level / 100.0).clamp(0.0, 1.0);
        WEAKNESS_FAILURE_WEIGHT * (1.0 - success) + WEAKNESS_MASTERY_WEIGHT * (1.0 - mastery)
    }

    /// Intervals each grade would produce: again, hard, good, easy
    pub fn preview(&self, progress: &Progress, now: DateTime<Utc>) -> [i64; 4] {
        Grade::ALL.map(|grade| self.schedule(progress, grade.quality(), now).interval_days)
    }
}

/// Format an interval in days as a short label
pub fn format_interval(days: i64) -> String {
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
