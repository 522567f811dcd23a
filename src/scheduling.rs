//! Spaced repetition scheduling.
//!
//! Both classifiers work on the same success ratio,
//! `correct / (wrong + correct + 1)`, which is always below 1 and is 0 for a
//! question with no history. They use separately tuned cut points:
//!
//! | ratio       | next review | difficulty |
//! |-------------|-------------|------------|
//! | >= 0.8      | +7 days     | easy       |
//! | 0.7 .. 0.8  | +3 days     | easy       |
//! | 0.6 .. 0.7  | +3 days     | medium     |
//! | 0.4 .. 0.6  | +1 day      | medium     |
//! | < 0.4       | immediately | hard       |

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::{Difficulty, Outcome, QuestionStats};
use crate::store::{BlobStore, StatsStore};

// Review delay cut points
const WELL_KNOWN_RATIO: f64 = 0.8;
const AVERAGE_RATIO: f64 = 0.6;
const DIFFICULT_RATIO: f64 = 0.4;

// Difficulty cut points
const EASY_RATIO: f64 = 0.7;
const MEDIUM_RATIO: f64 = 0.4;

pub fn success_ratio(wrong_count: u32, correct_count: u32) -> f64 {
    let attempts = wrong_count as f64 + correct_count as f64 + 1.0;
    correct_count as f64 / attempts
}

/// Whole days until the question should be reviewed again.
pub fn review_delay_days(wrong_count: u32, correct_count: u32) -> i64 {
    let ratio = success_ratio(wrong_count, correct_count);

    if ratio >= WELL_KNOWN_RATIO {
        7
    } else if ratio >= AVERAGE_RATIO {
        3
    } else if ratio >= DIFFICULT_RATIO {
        1
    } else {
        0
    }
}

pub fn next_review_date(wrong_count: u32, correct_count: u32, from: DateTime<Utc>) -> DateTime<Utc> {
    from + Duration::days(review_delay_days(wrong_count, correct_count))
}

pub fn difficulty(wrong_count: u32, correct_count: u32) -> Difficulty {
    let ratio = success_ratio(wrong_count, correct_count);

    if ratio >= EASY_RATIO {
        Difficulty::Easy
    } else if ratio >= MEDIUM_RATIO {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Records answer outcomes and resets, the only write path into the stats map.
pub struct Scheduler<'a, B: BlobStore> {
    store: &'a mut StatsStore<B>,
}

impl<'a, B: BlobStore> Scheduler<'a, B> {
    pub fn new(store: &'a mut StatsStore<B>) -> Self {
        Self { store }
    }

    pub fn record_outcome(&mut self, question_id: &str, outcome: Outcome) -> QuestionStats {
        self.record_outcome_at(question_id, outcome, Utc::now())
    }

    pub fn record_outcome_at(
        &mut self,
        question_id: &str,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> QuestionStats {
        let mut stats = self
            .store
            .get_question_stats(question_id)
            .cloned()
            .unwrap_or_else(|| QuestionStats::new(question_id, now));

        stats.record(outcome, now);

        debug!(
            "recorded {} for {}: wrong={} correct={} difficulty={} next={}",
            outcome.as_str(),
            question_id,
            stats.wrong_count(),
            stats.correct_count(),
            stats.difficulty().as_str(),
            stats.next_review_date().to_rfc3339()
        );

        self.store.put_stats(stats.clone());
        stats
    }

    /// Drops the record for one question. Returns false if there was none.
    pub fn reset_question(&mut self, question_id: &str) -> bool {
        self.store.remove_stats(question_id)
    }

    /// Clears every question record and the whole session log.
    pub fn reset_all(&mut self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use chrono::TimeZone;

    fn setup_store() -> StatsStore<MemoryBlobStore> {
        StatsStore::open(MemoryBlobStore::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 8, 30, 0).unwrap()
    }

    mod ratio_tests {
        use super::*;

        #[test]
        fn ratio_zero_without_history() {
            assert_eq!(success_ratio(0, 0), 0.0);
        }

        #[test]
        fn ratio_never_reaches_one() {
            assert!(success_ratio(0, 1_000) < 1.0);
            assert!(success_ratio(0, u32::MAX) < 1.0);
        }

        #[test]
        fn ratio_uses_padded_denominator() {
            assert_eq!(success_ratio(2, 7), 0.7);
            assert_eq!(success_ratio(0, 4), 0.8);
        }
    }

    mod delay_tests {
        use super::*;

        #[test]
        fn fresh_question_is_due_immediately() {
            assert_eq!(review_delay_days(0, 0), 0);
        }

        #[test]
        fn well_known_boundary_is_inclusive() {
            // 4 / 5 = 0.8
            assert_eq!(review_delay_days(0, 4), 7);
            // 3 / 4 = 0.75
            assert_eq!(review_delay_days(0, 3), 3);
        }

        #[test]
        fn average_boundary_is_inclusive() {
            // 3 / 5 = 0.6
            assert_eq!(review_delay_days(1, 3), 3);
            // 2 / 4 = 0.5
            assert_eq!(review_delay_days(1, 2), 1);
        }

        #[test]
        fn difficult_boundary_is_inclusive() {
            // 2 / 5 = 0.4
            assert_eq!(review_delay_days(2, 2), 1);
            // 1 / 3 = 0.33
            assert_eq!(review_delay_days(1, 1), 0);
        }

        #[test]
        fn mostly_wrong_is_due_immediately() {
            assert_eq!(review_delay_days(10, 1), 0);
        }

        #[test]
        fn delay_is_deterministic() {
            for wrong in 0..15 {
                for correct in 0..15 {
                    assert_eq!(
                        review_delay_days(wrong, correct),
                        review_delay_days(wrong, correct)
                    );
                    assert_eq!(difficulty(wrong, correct), difficulty(wrong, correct));
                }
            }
        }

        #[test]
        fn next_review_date_adds_calendar_days() {
            let from = now();
            assert_eq!(next_review_date(0, 0, from), from);
            assert_eq!(
                next_review_date(0, 4, from),
                Utc.with_ymd_and_hms(2024, 2, 7, 8, 30, 0).unwrap()
            );
            // 2024 is a leap year
            assert_eq!(
                next_review_date(1, 3, Utc.with_ymd_and_hms(2024, 2, 27, 0, 0, 0).unwrap()),
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            );
        }
    }

    mod difficulty_tests {
        use super::*;

        #[test]
        fn fresh_question_is_hard() {
            assert_eq!(difficulty(0, 0), Difficulty::Hard);
        }

        #[test]
        fn easy_boundary_is_inclusive() {
            // 7 / 10 = 0.7
            assert_eq!(difficulty(2, 7), Difficulty::Easy);
            // 6 / 9 = 0.67
            assert_eq!(difficulty(2, 6), Difficulty::Medium);
        }

        #[test]
        fn medium_boundary_is_inclusive() {
            assert_eq!(difficulty(2, 2), Difficulty::Medium);
            assert_eq!(difficulty(3, 2), Difficulty::Hard);
        }

        #[test]
        fn classifiers_disagree_between_cut_points() {
            // 3 / 4 = 0.75: easy, but only three days until review
            assert_eq!(difficulty(0, 3), Difficulty::Easy);
            assert_eq!(review_delay_days(0, 3), 3);
        }
    }

    mod scheduler_tests {
        use super::*;

        #[test]
        fn first_outcome_creates_record() {
            let mut store = setup_store();
            assert!(store.get_question_stats("q1").is_none());

            Scheduler::new(&mut store).record_outcome_at("q1", Outcome::Wrong, now());

            let stats = store.get_question_stats("q1").unwrap();
            assert_eq!(stats.wrong_count(), 1);
            assert_eq!(stats.correct_count(), 0);
            assert_eq!(stats.difficulty(), Difficulty::Hard);
            assert_eq!(stats.last_review_date(), now());
            assert_eq!(stats.next_review_date(), now());
        }

        #[test]
        fn first_correct_answer_is_medium() {
            let mut store = setup_store();
            let stats = Scheduler::new(&mut store).record_outcome_at("q1", Outcome::Correct, now());
            // 1 / 2 = 0.5
            assert_eq!(stats.difficulty(), Difficulty::Medium);
            assert_eq!(stats.next_review_date(), now() + Duration::days(1));
        }

        #[test]
        fn counters_match_outcome_totals() {
            let mut store = setup_store();
            let mut scheduler = Scheduler::new(&mut store);
            let sequence = [
                Outcome::Wrong,
                Outcome::Correct,
                Outcome::Correct,
                Outcome::Wrong,
                Outcome::Correct,
                Outcome::Wrong,
                Outcome::Correct,
            ];
            for outcome in sequence {
                scheduler.record_outcome_at("q1", outcome, now());
            }

            let stats = store.get_question_stats("q1").unwrap();
            assert_eq!(stats.wrong_count(), 3);
            assert_eq!(stats.correct_count(), 4);
        }

        #[test]
        fn derived_fields_follow_updated_counters() {
            let mut store = setup_store();
            let mut scheduler = Scheduler::new(&mut store);
            for _ in 0..2 {
                scheduler.record_outcome_at("q1", Outcome::Wrong, now());
            }
            for _ in 0..7 {
                scheduler.record_outcome_at("q1", Outcome::Correct, now());
            }

            let stats = store.get_question_stats("q1").unwrap();
            assert_eq!(stats.difficulty(), difficulty(2, 7));
            assert_eq!(stats.difficulty(), Difficulty::Easy);
            assert_eq!(
                stats.next_review_date() - stats.last_review_date(),
                Duration::days(review_delay_days(2, 7))
            );
        }

        #[test]
        fn outcome_is_visible_immediately() {
            let mut store = setup_store();
            Scheduler::new(&mut store).record_outcome_at("q1", Outcome::Wrong, now());
            let due = store.sequencer().due_for_review(&["q1"], now());
            assert_eq!(due, vec!["q1"]);
        }

        #[test]
        fn reset_question_removes_record() {
            let mut store = setup_store();
            let mut scheduler = Scheduler::new(&mut store);
            scheduler.record_outcome_at("q1", Outcome::Wrong, now());
            scheduler.record_outcome_at("q2", Outcome::Wrong, now());

            assert!(scheduler.reset_question("q1"));
            assert!(store.get_question_stats("q1").is_none());
            assert!(store.get_question_stats("q2").is_some());
        }

        #[test]
        fn reset_question_on_unknown_id_is_noop() {
            let mut store = setup_store();
            let mut scheduler = Scheduler::new(&mut store);
            assert!(!scheduler.reset_question("missing"));
            assert!(!scheduler.reset_question("missing"));
            assert!(store.get_question_stats("missing").is_none());
        }

        #[test]
        fn reset_question_restarts_history() {
            let mut store = setup_store();
            let mut scheduler = Scheduler::new(&mut store);
            for _ in 0..5 {
                scheduler.record_outcome_at("q1", Outcome::Correct, now());
            }
            scheduler.reset_question("q1");

            let stats = scheduler.record_outcome_at("q1", Outcome::Correct, now());
            assert_eq!(stats.correct_count(), 1);
        }

        #[test]
        fn reset_all_clears_stats_and_sessions() {
            let mut store = setup_store();
            Scheduler::new(&mut store).record_outcome_at("q1", Outcome::Wrong, now());
            store.append_session_at(
                crate::models::NewSession {
                    date: now(),
                    topic_ids: Default::default(),
                    total_questions: 1,
                    unknown_questions: vec!["q1".to_string()],
                    duration: 1_000,
                },
                now(),
            );

            Scheduler::new(&mut store).reset_all();

            assert!(store.all_stats().is_empty());
            assert!(store.sessions().is_empty());
        }
    }
}
