//! Keyed, cancellable, fire-once deferred tasks.
//!
//! Each scheduled task is a tokio task sleeping on a child of a root
//! [`CancellationToken`]. Scheduling a key that is already pending cancels
//! the earlier task. Tasks re-check whatever state they act on when they
//! fire; cancellation only saves the wakeup.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Scheduled {
    generation: u64,
    token: CancellationToken,
}

/// Pending deferred tasks keyed by `K`.
pub struct DeferredTasks<K> {
    root: CancellationToken,
    tasks: Arc<DashMap<K, Scheduled>>,
    next_generation: AtomicU64,
}

impl<K> DeferredTasks<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Run `task` once after `delay`, replacing any task pending for `key`.
    ///
    /// Must be called from within a tokio runtime; otherwise the task is
    /// dropped with a warning.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(?key, "no tokio runtime, deferred task dropped");
            return;
        };
        if self.root.is_cancelled() {
            debug!(?key, "deferred tasks shut down, not scheduling");
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let previous = self.tasks.insert(
            key.clone(),
            Scheduled {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        debug!(?key, delay_ms = delay.as_millis() as u64, "deferred task scheduled");

        let tasks = Arc::clone(&self.tasks);
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // A replacement may already own the key.
                    tasks.remove_if(&key, |_, s| s.generation == generation);
                    task();
                }
            }
        });
    }

    /// Cancel the task pending for `key`. Returns `true` if there was one.
    pub fn cancel(&self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some((_, scheduled)) => {
                scheduled.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending task whose key matches `predicate`.
    pub fn cancel_matching(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut cancelled = 0;
        self.tasks.retain(|key, scheduled| {
            if predicate(key) {
                scheduled.token.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel everything. Later `schedule` calls are ignored.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.tasks.clear();
    }
}

impl<K> Default for DeferredTasks<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let make = move || {
            let c = Arc::clone(&c);
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let tasks = DeferredTasks::new();
        let (count, make) = counter();
        tasks.schedule("a", Duration::from_secs(5), make());
        assert!(tasks.is_scheduled(&"a"));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!tasks.is_scheduled(&"a"));
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_task() {
        let tasks = DeferredTasks::new();
        let (count, make) = counter();
        tasks.schedule("a", Duration::from_secs(5), make());
        tasks.schedule("a", Duration::from_secs(10), make());
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tasks_never_fire() {
        let tasks = DeferredTasks::new();
        let (count, make) = counter();
        tasks.schedule(("p1", "m1"), Duration::from_secs(1), make());
        tasks.schedule(("p2", "m1"), Duration::from_secs(1), make());
        tasks.schedule(("p3", "m2"), Duration::from_secs(1), make());

        assert!(tasks.cancel(&("p1", "m1")));
        assert!(!tasks.cancel(&("p1", "m1")));
        assert_eq!(tasks.cancel_matching(|(_, m)| *m == "m2"), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let tasks = DeferredTasks::new();
        let (count, make) = counter();
        tasks.schedule(1u32, Duration::from_secs(1), make());
        tasks.shutdown();
        tasks.schedule(2u32, Duration::from_secs(1), make());
        assert!(tasks.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn schedule_outside_runtime_is_dropped() {
        let tasks = DeferredTasks::new();
        tasks.schedule("x", Duration::from_secs(1), || {});
        assert!(tasks.is_empty());
    }
}
