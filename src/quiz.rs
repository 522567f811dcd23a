//! A single quiz or review pass over a pool of questions.
//!
//! The pool is put in difficulty order when the run starts. Questions are then
//! drawn one at a time until the pool is exhausted or the run is stopped, and
//! every answer is recorded through the [`Scheduler`]. Finishing the run yields
//! the [`NewSession`] to append to the session log.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::debug;
use rand::Rng;
use serde::Serialize;

use crate::models::{NewSession, Outcome};
use crate::scheduling::Scheduler;
use crate::sequencer::SessionSequencer;
use crate::store::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    Test,
    Review,
}

impl QuizMode {
    pub fn label(&self) -> &'static str {
        match self {
            QuizMode::Test => "Quiz",
            QuizMode::Review => "Review",
        }
    }
}

// How the next question is picked from what remains of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawOrder {
    #[default]
    Random,
    Sequential,
}

#[derive(Debug, Clone)]
pub struct QuizRun {
    mode: QuizMode,
    draw_order: DrawOrder,
    topic_ids: BTreeSet<String>,
    remaining: Vec<String>,
    current: Option<String>,
    total: usize,
    answered: usize,
    unknown: Vec<String>,
    started_at: DateTime<Utc>,
}

impl QuizRun {
    /// Starts a quiz over `pool`. Returns `None` when there is nothing to ask.
    pub fn start(
        sequencer: &SessionSequencer<'_>,
        pool: &[String],
        topic_ids: BTreeSet<String>,
        draw_order: DrawOrder,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        Self::begin(QuizMode::Test, sequencer, pool, topic_ids, draw_order, now)
    }

    /// Starts a review pass over the questions marked unknown in `previous`.
    pub fn review(
        previous: &QuizRun,
        sequencer: &SessionSequencer<'_>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        Self::begin(
            QuizMode::Review,
            sequencer,
            &previous.unknown,
            previous.topic_ids.clone(),
            previous.draw_order,
            now,
        )
    }

    fn begin(
        mode: QuizMode,
        sequencer: &SessionSequencer<'_>,
        pool: &[String],
        topic_ids: BTreeSet<String>,
        draw_order: DrawOrder,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if pool.is_empty() {
            return None;
        }

        let remaining = sequencer.sort_by_difficulty(pool);
        debug!("starting {} run over {} questions", mode.label(), remaining.len());

        Some(Self {
            mode,
            draw_order,
            topic_ids,
            total: remaining.len(),
            remaining,
            current: None,
            answered: 0,
            unknown: Vec::new(),
            started_at: now,
        })
    }

    /// Takes the next question out of the pool. `None` once the pool is empty.
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Option<&str> {
        if self.remaining.is_empty() {
            self.current = None;
            return None;
        }

        let index = match self.draw_order {
            DrawOrder::Random => rng.gen_range(0..self.remaining.len()),
            DrawOrder::Sequential => 0,
        };
        self.current = Some(self.remaining.remove(index));
        self.current.as_deref()
    }

    /// Records an answer for the question last drawn. Does nothing if no
    /// question is pending.
    pub fn answer<B: BlobStore>(
        &mut self,
        scheduler: &mut Scheduler<'_, B>,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) {
        let Some(question_id) = self.current.take() else {
            return;
        };

        scheduler.record_outcome_at(&question_id, outcome, now);
        if outcome == Outcome::Wrong {
            self.unknown.push(question_id);
        }
        self.answered += 1;
    }

    /// Ends the run (exhausted or stopped) and builds its log entry.
    pub fn finish(&self, now: DateTime<Utc>) -> NewSession {
        NewSession {
            date: now,
            topic_ids: self.topic_ids.clone(),
            total_questions: self.total,
            unknown_questions: self.unknown.clone(),
            duration: self.elapsed_ms(now),
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty() && self.current.is_none()
    }
}

/// Formats elapsed milliseconds as `MM:SS.cc`.
pub fn format_elapsed(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centiseconds = (ms % 1_000) / 10;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centiseconds)
}
