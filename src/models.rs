use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduling;

// Difficulty tiers derived from a question's answer history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Presentation priority: hard questions come first.
    pub fn rank(&self) -> u8 {
        match self {
            Difficulty::Hard => 0,
            Difficulty::Medium => 1,
            Difficulty::Easy => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Wrong,
    Correct,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Wrong => "wrong",
            Outcome::Correct => "correct",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wrong" | "w" | "unknown" | "u" | "no" | "n" | "0" => Some(Outcome::Wrong),
            "correct" | "c" | "known" | "k" | "yes" | "y" | "1" => Some(Outcome::Correct),
            _ => None,
        }
    }
}

/// Learning record for a single question.
///
/// `difficulty` and `next_review_date` are derived from the counters every time
/// an outcome is recorded and have no setters. Records are only created and
/// updated through [`crate::scheduling::Scheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    question_id: String,
    wrong_count: u32,
    correct_count: u32,
    last_review_date: DateTime<Utc>,
    next_review_date: DateTime<Utc>,
    difficulty: Difficulty,
}

impl QuestionStats {
    // Fresh record for a question that has never been answered
    pub(crate) fn new(question_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            question_id: question_id.into(),
            wrong_count: 0,
            correct_count: 0,
            last_review_date: now,
            next_review_date: now,
            difficulty: Difficulty::Medium,
        }
    }

    pub(crate) fn record(&mut self, outcome: Outcome, now: DateTime<Utc>) {
        match outcome {
            Outcome::Wrong => self.wrong_count += 1,
            Outcome::Correct => self.correct_count += 1,
        }

        self.last_review_date = now;
        self.next_review_date =
            scheduling::next_review_date(self.wrong_count, self.correct_count, now);
        self.difficulty = scheduling::difficulty(self.wrong_count, self.correct_count);
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn last_review_date(&self) -> DateTime<Utc> {
        self.last_review_date
    }

    pub fn next_review_date(&self) -> DateTime<Utc> {
        self.next_review_date
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn times_answered(&self) -> u32 {
        self.wrong_count + self.correct_count
    }

    pub fn success_rate(&self) -> f64 {
        if self.times_answered() == 0 {
            0.0
        } else {
            (self.correct_count as f64 / self.times_answered() as f64) * 100.0
        }
    }

    /// A question is due once its review date has passed, but only if it has
    /// been missed at least once.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.wrong_count > 0 && self.next_review_date <= now
    }
}

// A finished (or stopped) quiz run, as stored in the session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSession {
    pub id: String,
    pub date: DateTime<Utc>,
    pub topic_ids: BTreeSet<String>,
    pub total_questions: usize,
    pub unknown_questions: Vec<String>,
    /// Elapsed milliseconds.
    pub duration: u64,
}

// A session before the store has assigned it an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub date: DateTime<Utc>,
    pub topic_ids: BTreeSet<String>,
    pub total_questions: usize,
    pub unknown_questions: Vec<String>,
    pub duration: u64,
}

impl NewSession {
    pub fn with_id(self, id: String) -> LearningSession {
        LearningSession {
            id,
            date: self.date,
            topic_ids: self.topic_ids,
            total_questions: self.total_questions,
            unknown_questions: self.unknown_questions,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub tracked_questions: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
    pub total_wrong: u64,
    pub total_correct: u64,
    pub due_now: usize,
    pub sessions: usize,
    pub last_session: Option<DateTime<Utc>>,
}

impl StatsSummary {
    pub fn accuracy(&self) -> f64 {
        let answered = self.total_wrong + self.total_correct;
        if answered == 0 {
            0.0
        } else {
            (self.total_correct as f64 / answered as f64) * 100.0
        }
    }
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
