//! Per-path in-flight request counter.
//!
//! Every request bumps the counter for its path on entry and drops it on
//! exit, including when a handler panics: the decrement lives in the
//! [`Drop`] impl of [`AccessGuard`]. The [`limit`](crate::middleware::limit)
//! middleware reads these counts to throttle hot endpoints.
//!
//! The whole map is wiped on a fixed interval (one hour by default) so paths
//! seen once do not pin memory forever. Each reset starts a new generation.
//! Guards entered before it are forgotten and their decrement is skipped, so
//! a count can under-report for a while but never goes negative.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default)]
pub struct AccessCounter {
    data: RwLock<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    generation: u64,
    paths: HashMap<String, i64>,
}

impl Counts {
    fn release(&mut self, path: &str) {
        if let Some(n) = self.paths.get_mut(path) {
            *n = (*n - 1).max(0);
        }
    }
}

impl AccessCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, path: &str) {
        self.enter_generation(path);
    }

    /// Paths with no entry (never seen, or wiped by a reset) are left alone,
    /// and a count already at zero stays there.
    pub fn decrement(&self, path: &str) {
        self.data.write().release(path);
    }

    /// Current in-flight count for `path`, zero if unseen.
    pub fn get(&self, path: &str) -> i64 {
        self.data.read().paths.get(path).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        let mut data = self.data.write();
        data.paths = HashMap::new();
        data.generation += 1;
    }

    /// Increments `path` and returns a guard that decrements it on drop,
    /// unless the counter was reset in between.
    pub fn enter(&self, path: &str) -> AccessGuard<'_> {
        let generation = self.enter_generation(path);
        AccessGuard { counter: self, path: path.to_owned(), generation }
    }

    /// Increments `path` only while it is below `max`. On success returns
    /// the generation to hand back to [`leave`](Self::leave).
    pub(crate) fn try_enter(&self, path: &str, max: i64) -> Option<u64> {
        let mut data = self.data.write();
        let n = data.paths.entry(path.to_owned()).or_insert(0);
        if *n >= max {
            return None;
        }
        *n += 1;
        Some(data.generation)
    }

    /// Undoes an increment made in `generation`. A no-op after a reset.
    pub(crate) fn leave(&self, path: &str, generation: u64) {
        let mut data = self.data.write();
        if data.generation == generation {
            data.release(path);
        }
    }

    fn enter_generation(&self, path: &str) -> u64 {
        let mut data = self.data.write();
        *data.paths.entry(path.to_owned()).or_insert(0) += 1;
        data.generation
    }

    /// Spawns the periodic reset onto the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the counter is
    /// dropped.
    pub fn spawn_reset(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(counter) = weak.upgrade() else { break };
                counter.reset();
                debug!("access counter reset");
            }
        })
    }
}

/// Scoped in-flight marker returned by [`AccessCounter::enter`].
#[derive(Debug)]
pub struct AccessGuard<'a> {
    counter: &'a AccessCounter,
    path: String,
    generation: u64,
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.counter.leave(&self.path, self.generation);
    }
}
