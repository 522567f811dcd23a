use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::QuestionStats;

/// Orders and filters question pools using recorded stats.
///
/// Pool items only need to expose their question id, so callers can pass
/// plain ids or their own question handles.
pub struct SessionSequencer<'a> {
    stats: &'a BTreeMap<String, QuestionStats>,
}

impl<'a> SessionSequencer<'a> {
    pub fn new(stats: &'a BTreeMap<String, QuestionStats>) -> Self {
        Self { stats }
    }

    /// Hardest first, then most often missed. Questions without stats go last
    /// and keep their relative order.
    pub fn sort_by_difficulty<T>(&self, pool: &[T]) -> Vec<T>
    where
        T: AsRef<str> + Clone,
    {
        let mut sorted = pool.to_vec();
        // sort_by_key is stable
        sorted.sort_by_key(|q| match self.lookup(q) {
            Some(stats) => (false, stats.difficulty().rank(), Reverse(stats.wrong_count())),
            None => (true, 0, Reverse(0)),
        });
        sorted
    }

    /// Questions that were missed at least once and whose review date has
    /// passed, in pool order.
    pub fn due_for_review<T>(&self, pool: &[T], now: DateTime<Utc>) -> Vec<T>
    where
        T: AsRef<str> + Clone,
    {
        pool.iter()
            .filter(|q| self.lookup(*q).map(|stats| stats.is_due(now)).unwrap_or(false))
            .cloned()
            .collect()
    }

    fn lookup<T: AsRef<str>>(&self, question: &T) -> Option<&'a QuestionStats> {
        let id: &str = question.as_ref();
        self.stats.get(id)
    }
}
