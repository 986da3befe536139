use std::{
    any::Any,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::debug;

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    tags: HashSet<String>,
    stored_at: Instant,
}

/// Last successful result per query key. Mutations invalidate by entity tag, dropping
/// every key that depends on it.
pub struct QueryCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl QueryCache {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::default(),
            ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries();
        if entries.get(key)?.stored_at.elapsed() >= self.ttl {
            entries.remove(key);
            return None;
        }
        entries.get(key)?.value.downcast_ref::<T>().cloned()
    }

    pub fn put<T: Clone + Send + Sync + 'static>(&self, key: &str, tags: &[String], value: T) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            key.to_owned(),
            Entry {
                value: Arc::new(value),
                tags: tags.iter().cloned().collect(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry tagged with `tag`; returns how many went.
    pub fn invalidate(&self, tag: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.contains(tag));
        let dropped = before - entries.len();
        debug!("invalidated {dropped} queries tagged {tag}");
        dropped
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
