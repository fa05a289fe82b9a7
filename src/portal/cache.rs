//! Per-session response cache for read endpoints.
//!
//! Lifecycle: created once with the server state, entries are invalidated by
//! path prefix whenever a write touches the data behind them, and a session's
//! entries are dropped when that session logs out. The progress mapper and
//! milestone tracker never see this type; it only stores their JSON output.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scope: String,
    path: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

pub struct QueryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl QueryCache {
    /// A zero `ttl` disables caching: nothing is stored.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, scope: &str, path: &str) -> Option<Value> {
        let key = CacheKey {
            scope: scope.to_string(),
            path: path.to_string(),
        };
        let mut entries = self.entries();
        let is_fresh = entries
            .get(&key)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;
        if is_fresh {
            debug!(path, "query cache hit");
            entries.get(&key).map(|entry| entry.value.clone())
        } else {
            entries.remove(&key);
            None
        }
    }

    pub fn insert(&self, scope: &str, path: &str, value: Value) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries();
        Self::sweep(&mut entries, self.ttl);
        entries.insert(
            CacheKey {
                scope: scope.to_string(),
                path: path.to_string(),
            },
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry, in every session, whose path starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.path.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "query cache invalidated");
        }
        removed
    }

    /// Drop everything cached for one session.
    pub fn end_scope(&self, scope: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| key.scope != scope);
        before - entries.len()
    }

    /// Drop every entry older than the TTL, whichever session owns it.
    pub fn purge_expired(&self) -> usize {
        Self::sweep(&mut self.entries(), self.ttl)
    }

    fn sweep(entries: &mut HashMap<CacheKey, CacheEntry>, ttl: Duration) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "query cache swept stale entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
