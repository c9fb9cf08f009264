//! Keyed background tasks with deterministic teardown
//!
//! Each task is registered under a string key ("feed", "search", "presence").
//! Scheduling a key that already has a task cancels the old one first, so a
//! key never has two live tasks. Dropping the [`Scheduler`] cancels all of
//! them.

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ScheduledTask {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

type TaskMap = Arc<DashMap<String, ScheduledTask>>;

/// Disposal handle for a polling task. Dropping it cancels the task.
#[must_use = "dropping the handle cancels the task; call detach() to keep it running"]
pub struct TaskHandle {
    key: String,
    token: CancellationToken,
    armed: bool,
}

impl TaskHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Leave the task running until its key is cancelled or the scheduler
    /// is dropped.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
        }
    }
}

/// Owner of a set of keyed background tasks
pub struct Scheduler {
    tasks: TaskMap,
    generation: AtomicU64,
    root: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            root: CancellationToken::new(),
        }
    }

    /// Run `task` now and then every `interval` until cancelled.
    ///
    /// A tick that overruns delays the next one instead of bursting.
    pub fn schedule_poll<F, Fut>(&self, key: impl Into<String>, interval: Duration, mut task: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let period = interval.max(Duration::from_millis(1));
        let token = self.root.child_token();
        let (generation, tasks) = (self.next_generation(), self.tasks.clone());

        let task_token = token.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = task() => {}
                }
            }
            debug!(key = %task_key, "Poll task stopped");
            forget(&tasks, &task_key, generation);
        });

        debug!(key = %key, interval_ms = period.as_millis() as u64, "Poll task scheduled");
        self.register(key.clone(), generation, token.clone(), handle);
        TaskHandle {
            key,
            token,
            armed: true,
        }
    }

    /// Run `task` after `delay` unless the key is scheduled again first.
    ///
    /// Every call restarts the countdown; only the last call within `delay`
    /// runs, with whatever that call captured.
    pub fn schedule_debounced<Fut>(&self, key: impl Into<String>, delay: Duration, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let token = self.root.child_token();
        let (generation, tasks) = (self.next_generation(), self.tasks.clone());

        let task_token = token.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {}
                _ = async {
                    tokio::time::sleep(delay).await;
                    task.await;
                } => {}
            }
            forget(&tasks, &task_key, generation);
        });

        self.register(key, generation, token, handle);
    }

    /// Cancel the task under `key`. Returns whether one was registered.
    pub fn cancel(&self, key: &str) -> bool {
        match self.tasks.remove(key) {
            Some((_, task)) => {
                task.token.cancel();
                debug!(key, "Task cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Keys with a live task
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tasks
            .iter()
            .filter(|e| !e.value().token.is_cancelled() && !e.value().handle.is_finished())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, key: String, generation: u64, token: CancellationToken, handle: JoinHandle<()>) {
        let replaced = self.tasks.insert(
            key.clone(),
            ScheduledTask {
                generation,
                token,
                handle,
            },
        );
        if let Some(old) = replaced {
            old.token.cancel();
            debug!(key = %key, "Replaced scheduled task");
        }
    }
}

/// Drop the registry entry of a finished task, unless it was replaced
fn forget(tasks: &TaskMap, key: &str, generation: u64) {
    tasks.remove_if(key, |_, task| task.generation == generation);
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
