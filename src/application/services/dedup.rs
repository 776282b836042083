//! Trailing-window de-duplication of inbound requests

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::traits::Clock;

/// Default trailing window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Key a request is de-duplicated on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn friend(user_id: &str) -> Self {
        Self(user_id.to_string())
    }

    pub fn group(user_id: &str, group_id: &str) -> Self {
        Self(format!("{}:{}", user_id, group_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remembers when each key was last accepted.
///
/// `should_accept` is read-only and `record` stamps a key. `try_accept` does
/// both under one lock, so concurrent handlers cannot accept the same key.
pub struct DedupTimer {
    seen: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
    window: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl DedupTimer {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    fn seen(&self) -> MutexGuard<'_, HashMap<DedupKey, DateTime<Utc>>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True if the key was never recorded or its last record is at least one
    /// window old.
    pub fn should_accept(&self, key: &DedupKey) -> bool {
        let now = self.clock.now();
        match self.seen().get(key) {
            Some(last) => now - *last >= self.window,
            None => true,
        }
    }

    pub fn record(&self, key: DedupKey) {
        let now = self.clock.now();
        self.seen().insert(key, now);
    }

    /// Accept and stamp the key if `should_accept` would; otherwise leave it.
    pub fn try_accept(&self, key: &DedupKey) -> bool {
        let now = self.clock.now();
        let mut seen = self.seen();
        if seen.get(key).is_some_and(|last| now - *last < self.window) {
            return false;
        }
        seen.insert(key.clone(), now);
        true
    }

    /// Undo an accept whose request was never persisted.
    pub fn forget(&self, key: &DedupKey) {
        self.seen().remove(key);
    }

    /// Drop every entry at least one window old.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let window = self.window;
        let mut seen = self.seen();
        let before = seen.len();
        seen.retain(|_, last| now - *last < window);
        let removed = before - seen.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = seen.len(), "Swept request timer");
        }
    }

    pub fn len(&self) -> usize {
        self.seen().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_seen(&self, key: &DedupKey) -> Option<DateTime<Utc>> {
        self.seen().get(key).copied()
    }
}
