//! Local persistence for question stats and the session log.
//!
//! Both collections are kept in memory and written through to a [`BlobStore`]
//! as JSON under two fixed keys. Reads never fail: anything that cannot be
//! loaded is treated as "no data yet".

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Difficulty, LearningSession, NewSession, QuestionStats, StatsSummary};
use crate::sequencer::SessionSequencer;

pub const STATS_KEY: &str = "rf_learning_stats";
pub const SESSIONS_KEY: &str = "rf_learning_sessions";

/// Number of sessions kept in the log, newest first.
pub const MAX_SESSIONS: usize = 50;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Synchronous string key/value substrate.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }
}

/// Reads and decodes one blob. Missing keys, backend errors and undecodable
/// payloads all come back as `T::default()`.
pub fn read_or_empty<B, T>(backend: &B, key: &str) -> T
where
    B: BlobStore + ?Sized,
    T: DeserializeOwned + Default,
{
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("could not read {}, starting empty: {}", key, e);
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("discarding corrupt {} blob: {}", key, e);
            T::default()
        }
    }
}

pub struct StatsStore<B: BlobStore> {
    backend: B,
    stats: BTreeMap<String, QuestionStats>,
    sessions: Vec<LearningSession>,
}

impl<B: BlobStore> StatsStore<B> {
    pub fn open(backend: B) -> Self {
        let stats: BTreeMap<String, QuestionStats> = read_or_empty(&backend, STATS_KEY);
        let sessions: Vec<LearningSession> = read_or_empty(&backend, SESSIONS_KEY);
        debug!(
            "loaded {} question stats and {} sessions",
            stats.len(),
            sessions.len()
        );

        Self {
            backend,
            stats,
            sessions,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn get_question_stats(&self, question_id: &str) -> Option<&QuestionStats> {
        self.stats.get(question_id)
    }

    pub fn all_stats(&self) -> &BTreeMap<String, QuestionStats> {
        &self.stats
    }

    /// Session log, most recent first.
    pub fn sessions(&self) -> &[LearningSession] {
        &self.sessions
    }

    pub fn sequencer(&self) -> SessionSequencer<'_> {
        SessionSequencer::new(&self.stats)
    }

    pub fn append_session(&mut self, session: NewSession) -> LearningSession {
        self.append_session_at(session, Utc::now())
    }

    pub fn append_session_at(&mut self, session: NewSession, now: DateTime<Utc>) -> LearningSession {
        let mut millis = now.timestamp_millis();
        while self.sessions.iter().any(|s| s.id == millis.to_string()) {
            millis += 1;
        }

        let session = session.with_id(millis.to_string());
        self.sessions.insert(0, session.clone());
        self.sessions.truncate(MAX_SESSIONS);
        persist(&mut self.backend, SESSIONS_KEY, &self.sessions);

        session
    }

    pub fn summary(&self, now: DateTime<Utc>) -> StatsSummary {
        let mut summary = StatsSummary {
            tracked_questions: self.stats.len(),
            sessions: self.sessions.len(),
            last_session: self.sessions.first().map(|s| s.date),
            ..Default::default()
        };

        for stats in self.stats.values() {
            match stats.difficulty() {
                Difficulty::Easy => summary.easy += 1,
                Difficulty::Medium => summary.medium += 1,
                Difficulty::Hard => summary.hard += 1,
            }
            summary.total_wrong += stats.wrong_count() as u64;
            summary.total_correct += stats.correct_count() as u64;
            if stats.is_due(now) {
                summary.due_now += 1;
            }
        }

        summary
    }

    pub(crate) fn put_stats(&mut self, stats: QuestionStats) {
        self.stats.insert(stats.question_id().to_string(), stats);
        persist(&mut self.backend, STATS_KEY, &self.stats);
    }

    pub(crate) fn remove_stats(&mut self, question_id: &str) -> bool {
        if self.stats.remove(question_id).is_none() {
            return false;
        }
        persist(&mut self.backend, STATS_KEY, &self.stats);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.stats.clear();
        self.sessions.clear();

        for key in [STATS_KEY, SESSIONS_KEY] {
            if let Err(e) = self.backend.remove(key) {
                warn!("could not remove {}: {}", key, e);
            }
        }
    }
}

// Failed writes are logged and dropped; the in-memory copy stays current.
fn persist<B, T>(backend: &mut B, key: &str, value: &T)
where
    B: BlobStore + ?Sized,
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(StoreError::from)
        .and_then(|blob| backend.set(key, &blob));

    if let Err(e) = result {
        warn!("could not persist {}: {}", key, e);
    }
}
