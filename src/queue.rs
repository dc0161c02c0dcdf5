//! Practice queues built on top of the SRS calculator.
//!
//! The review queue always lists overdue concepts first, then concepts that
//! are merely due, then a capped number of never-practiced ones. The drill
//! queue ignores due dates and ranks by weakness.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::models::ConceptWithProgress;
use crate::srs::{DueStatus, SrsCalculator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub review_limit: usize,
    pub new_limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub item: ConceptWithProgress,
    pub status: DueStatus,
    pub priority: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrillEntry {
    pub item: ConceptWithProgress,
    pub weakness: f64,
}

fn bucket(status: DueStatus) -> u8 {
    match status {
        DueStatus::Overdue => 0,
        DueStatus::Due => 1,
        DueStatus::New => 2,
        DueStatus::NotDue => 3,
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn review_queue(
    calc: &SrsCalculator,
    items: Vec<ConceptWithProgress>,
    now: DateTime<Utc>,
    limits: QueueLimits,
) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = items
        .into_iter()
        .filter_map(|item| {
            let status = calc.due_status(&item.progress, now);
            if status == DueStatus::NotDue {
                return None;
            }
            let priority = calc.priority(&item.progress, now);
            Some(QueueEntry {
                item,
                status,
                priority,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        bucket(a.status)
            .cmp(&bucket(b.status))
            .then_with(|| match a.status {
                DueStatus::Overdue => by_score_desc(a.priority, b.priority),
                _ => Ordering::Equal,
            })
            .then_with(|| {
                a.item
                    .progress
                    .next_review_at()
                    .cmp(&b.item.progress.next_review_at())
            })
            .then_with(|| a.item.concept.id.cmp(&b.item.concept.id))
    });

    let mut new_seen = 0;
    entries.retain(|entry| {
        if entry.status != DueStatus::New {
            return true;
        }
        new_seen += 1;
        new_seen <= limits.new_limit
    });
    entries.truncate(limits.review_limit);

    tracing::debug!(
        entries = entries.len(),
        due = entries.iter().filter(|e| e.status.is_due()).count(),
        "built review queue"
    );
    entries
}

pub fn drill_queue(
    calc: &SrsCalculator,
    items: Vec<ConceptWithProgress>,
    limit: usize,
) -> Vec<DrillEntry> {
    let mut entries: Vec<DrillEntry> = items
        .into_iter()
        .filter(|item| item.progress.times_practiced > 0)
        .map(|item| DrillEntry {
            weakness: calc.weakness(&item.progress),
            item,
        })
        .collect();

    entries.sort_by(|a, b| {
        by_score_desc(a.weakness, b.weakness)
            .then_with(|| {
                a.item
                    .progress
                    .last_practiced_at()
                    .cmp(&b.item.progress.last_practiced_at())
            })
            .then_with(|| a.item.concept.id.cmp(&b.item.concept.id))
    });
    entries.truncate(limit);
    entries
}

/// Roulette-wheel selection. All-zero weights fall back to the first item.
pub fn pick_weighted<'a, T, R: Rng>(
    items: &'a [T],
    weight: impl Fn(&T) -> f64,
    rng: &mut R,
) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }

    let weights: Vec<f64> = items.iter().map(|i| weight(i).max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return items.first();
    }

    let mut point = rng.gen::<f64>() * total;
    for (item, w) in items.iter().zip(&weights) {
        if *w <= 0.0 {
            continue;
        }
        point -= w;
        if point <= 0.0 {
            return Some(item);
        }
    }

    // Floating point leftovers land on the last weighted item
    items.iter().zip(&weights).rev().find(|(_, w)| **w > 0.0).map(|(i, _)| i)
}

/// Stochastic pick among everything that could be practiced now, leaning
/// toward urgent and weak concepts.
pub fn next_concept<R: Rng>(
    calc: &SrsCalculator,
    items: Vec<ConceptWithProgress>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<QueueEntry> {
    let candidates = review_queue(
        calc,
        items,
        now,
        QueueLimits {
            review_limit: usize::MAX,
            new_limit: usize::MAX,
        },
    );
    pick_weighted(&candidates, |e| 1.0 + e.priority, rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{timestamp, Concept, ConceptKind, MasteryState, Progress};
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(id: i64) -> ConceptWithProgress {
        ConceptWithProgress {
            concept: Concept {
                id,
                course_id: None,
                term: format!("słowo{}", id),
                translation: format!("word{}", id),
                kind: ConceptKind::Vocabulary,
                notes: None,
                created_at: String::new(),
                updated_at: String::new(),
            },
            progress: Progress::new(id, 2.5),
        }
    }

    fn practiced(id: i64, next_review: DateTime<Utc>, interval: i64) -> ConceptWithProgress {
        let mut it = item(id);
        it.progress.times_practiced = 2;
        it.progress.times_correct = 1;
        it.progress.state = MasteryState::Learning;
        it.progress.interval_days = interval;
        it.progress.next_review = Some(timestamp(next_review));
        it.progress.last_practiced = Some(timestamp(next_review - Duration::days(interval)));
        it
    }

    fn limits(review_limit: usize, new_limit: usize) -> QueueLimits {
        QueueLimits {
            review_limit,
            new_limit,
        }
    }

    fn ids(entries: &[QueueEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.item.concept.id).collect()
    }

    mod review_queue_tests {
        use super::*;

        #[test]
        fn empty_input_gives_empty_queue() {
            let queue = review_queue(&SrsCalculator::default(), vec![], now(), limits(10, 10));
            assert!(queue.is_empty());
        }

        #[test]
        fn excludes_not_due() {
            let items = vec![
                practiced(1, now() + Duration::days(2), 3),
                practiced(2, now() - Duration::hours(1), 3),
            ];
            let queue = review_queue(&SrsCalculator::default(), items, now(), limits(10, 10));
            assert_eq!(ids(&queue), vec![2]);
            assert_eq!(queue[0].status, DueStatus::Due);
        }

        #[test]
        fn overdue_before_due_before_new() {
            let items = vec![
                item(1),
                practiced(2, now() - Duration::hours(2), 1),
                practiced(3, now() - Duration::days(3), 10),
                item(4),
                practiced(5, now() - Duration::hours(5), 1),
            ];
            let queue = review_queue(&SrsCalculator::default(), items, now(), limits(10, 10));
            let statuses: Vec<DueStatus> = queue.iter().map(|e| e.status).collect();
            assert_eq!(
                statuses,
                vec![
                    DueStatus::Overdue,
                    DueStatus::Due,
                    DueStatus::Due,
                    DueStatus::New,
                    DueStatus::New
                ]
            );
            // Due ones by next_review ascending, new ones by id
            assert_eq!(ids(&queue), vec![3, 5, 2, 1, 4]);
        }

        #[test]
        fn overdue_sorted_by_priority() {
            // Same overdue time, shorter interval is more urgent
            let items = vec![
                practiced(1, now() - Duration::days(2), 20),
                practiced(2, now() - Duration::days(2), 1),
                practiced(3, now() - Duration::days(10), 20),
            ];
            let queue = review_queue(&SrsCalculator::default(), items, now(), limits(10, 10));
            assert_eq!(ids(&queue), vec![2, 3, 1]);
            assert!(queue.windows(2).all(|w| w[0].priority >= w[1].priority));
        }

        #[test]
        fn new_limit_caps_only_new_items() {
            let items = vec![
                item(1),
                item(2),
                item(3),
                practiced(4, now() - Duration::hours(1), 1),
            ];
            let queue = review_queue(&SrsCalculator::default(), items, now(), limits(10, 1));
            assert_eq!(ids(&queue), vec![4, 1]);
        }

        #[test]
        fn review_limit_caps_total_and_keeps_order() {
            let items = vec![
                item(1),
                practiced(2, now() - Duration::days(5), 1),
                practiced(3, now() - Duration::hours(1), 1),
            ];
            let queue = review_queue(&SrsCalculator::default(), items, now(), limits(2, 5));
            assert_eq!(ids(&queue), vec![2, 3]);
        }
    }

    mod drill_queue_tests {
        use super::*;

        #[test]
        fn skips_unpracticed() {
            let queue = drill_queue(&SrsCalculator::default(), vec![item(1), item(2)], 10);
            assert!(queue.is_empty());
        }

        #[test]
        fn weakest_first() {
            let mut strong = practiced(1, now() + Duration::days(9), 10);
            strong.progress.times_correct = 2;
            strong.progress.mastery_level = 90.0;
            let mut weak = practiced(2, now() + Duration::days(9), 10);
            weak.progress.times_correct = 0;
            weak.progress.mastery_level = 10.0;
            let middle = practiced(3, now() + Duration::days(9), 10);

            let queue = drill_queue(&SrsCalculator::default(), vec![strong, weak, middle], 10);
            let order: Vec<i64> = queue.iter().map(|e| e.item.concept.id).collect();
            assert_eq!(order, vec![2, 3, 1]);
            assert!(queue.windows(2).all(|w| w[0].weakness >= w[1].weakness));
        }

        #[test]
        fn ties_break_on_least_recent_practice() {
            let recent = practiced(1, now() + Duration::days(1), 1);
            let stale = practiced(2, now() - Duration::days(5), 1);
            let queue = drill_queue(&SrsCalculator::default(), vec![recent, stale], 10);
            assert_eq!(queue[0].item.concept.id, 2);
        }

        #[test]
        fn respects_limit() {
            let items = (1..=5)
                .map(|id| practiced(id, now(), 1))
                .collect::<Vec<_>>();
            assert_eq!(drill_queue(&SrsCalculator::default(), items, 3).len(), 3);
        }
    }

    mod pick_tests {
        use super::*;

        #[test]
        fn empty_returns_none() {
            let mut rng = StdRng::seed_from_u64(7);
            let items: Vec<u32> = vec![];
            assert!(pick_weighted(&items, |_| 1.0, &mut rng).is_none());
        }

        #[test]
        fn zero_weights_fall_back_to_first() {
            let mut rng = StdRng::seed_from_u64(7);
            let items = vec![10, 20, 30];
            assert_eq!(pick_weighted(&items, |_| 0.0, &mut rng), Some(&10));
        }

        #[test]
        fn never_picks_zero_weight_item() {
            let mut rng = StdRng::seed_from_u64(42);
            let items = vec![1, 2, 3];
            for _ in 0..200 {
                let picked = pick_weighted(&items, |i| if *i == 2 { 0.0 } else { 1.0 }, &mut rng);
                assert_ne!(picked, Some(&2));
            }
        }

        #[test]
        fn heavier_items_win_more_often() {
            let mut rng = StdRng::seed_from_u64(1);
            let items = vec![1, 2];
            let mut heavy = 0;
            for _ in 0..1000 {
                if pick_weighted(&items, |i| if *i == 1 { 9.0 } else { 1.0 }, &mut rng) == Some(&1) {
                    heavy += 1;
                }
            }
            assert!(heavy > 800, "heavy picked {} times", heavy);
        }

        #[test]
        fn next_concept_only_picks_practicable() {
            let mut rng = StdRng::seed_from_u64(3);
            let items = vec![
                practiced(1, now() + Duration::days(3), 3),
                practiced(2, now() - Duration::days(1), 1),
            ];
            for _ in 0..20 {
                let picked = next_concept(&SrsCalculator::default(), items.clone(), now(), &mut rng);
                assert_eq!(picked.map(|e| e.item.concept.id), Some(2));
            }
        }

        #[test]
        fn next_concept_none_when_nothing_due() {
            let mut rng = StdRng::seed_from_u64(3);
            let items = vec![practiced(1, now() + Duration::days(3), 3)];
            assert!(next_concept(&SrsCalculator::default(), items, now(), &mut rng).is_none());
        }
    }
}
