use crate::Clock;
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// Short-lived key/value entries with per-entry expiry.
pub trait Cache: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Option<String>> + Send;

    fn set(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = ()> + Send;

    /// Set only if absent (or expired). Returns whether the value was stored.
    fn add(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = bool> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = ()> + Send;
}

/// Minimum time between sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    value: String,
    expires_at: u64,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: u64,
}

impl Entries {
    /// Drop everything expired, at most once per [SWEEP_INTERVAL].
    fn sweep(&mut self, now: u64) {
        if now < self.next_sweep {
            return;
        }
        self.map.retain(|_, entry| entry.expires_at > now);
        self.next_sweep = now.saturating_add(SWEEP_INTERVAL.as_millis() as u64);
    }
}

/// In-process [Cache] that evaluates expiry against an injected clock.
///
/// Keys that are never read again are reclaimed by a periodic sweep on write.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry(&self, ttl: Duration) -> u64 {
        self.clock
            .now_ms()
            .saturating_add(ttl.as_millis() as u64)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut entries = self.entries();
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.map.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = self.clock.now_ms();
        let expires_at = self.expiry(ttl);
        let mut entries = self.entries();
        entries.sweep(now);
        entries
            .map
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn add(&self, key: &str, value: String, ttl: Duration) -> bool {
        let now = self.clock.now_ms();
        let expires_at = self.expiry(ttl);
        let mut entries = self.entries();
        entries.sweep(now);
        if entries.map.get(key).is_some_and(|e| e.expires_at > now) {
            return false;
        }
        entries
            .map
            .insert(key.to_string(), Entry { value, expires_at });
        true
    }

    async fn delete(&self, key: &str) {
        self.entries().map.remove(key);
    }
}
