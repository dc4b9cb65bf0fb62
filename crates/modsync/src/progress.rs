//! Progress reporting shared by the git bootstrap, fetch engine and
//! override sync, so a caller can drive one unified progress surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ActionError;

/// Unified `(task name, percent 0..100)` callback.
pub type TaskProgress = Arc<dyn Fn(Option<&str>, u8) + Send + Sync>;

/// Per-item error callback. Receiving a soft `AlreadyExists` is
/// informational, not a failure.
pub type ErrorCallback = Arc<dyn Fn(ActionError) + Send + Sync>;

/// Events emitted by the fetch engine while a batch is in flight.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// Batch progress. `total` is fixed up front and never decreases;
    /// `completed` is monotonically increasing.
    Progress { completed: u64, total: u64 },
    /// A transient per-file failure is being retried.
    Retry {
        url: String,
        attempt: usize,
        max_attempts: usize,
    },
}

pub type FetchCallback = Arc<dyn Fn(FetchEvent) + Send + Sync>;

/// No-op progress callback.
pub fn null_task_progress() -> TaskProgress {
    Arc::new(|_, _| {})
}

/// No-op fetch callback.
pub fn null_fetch_callback() -> FetchCallback {
    Arc::new(|_| {})
}

/// No-op error callback.
pub fn null_error_callback() -> ErrorCallback {
    Arc::new(|_| {})
}

/// Concurrency-safe registry of named progress tasks, keyed by a
/// normalized task identifier. A single lock guards the map; callbacks
/// from concurrent tasks funnel through [`ProgressTasks::update`].
#[derive(Debug, Default)]
pub struct ProgressTasks {
    tasks: Mutex<HashMap<String, u8>>,
}

impl ProgressTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercased, whitespace-stripped task id.
    pub fn normalize(name: &str) -> String {
        name.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_lowercase())
            .collect()
    }

    /// Record progress for a task, registering it on first sight.
    /// Percentages are clamped to 100 and never move backwards.
    pub fn update(&self, name: &str, percent: u8) {
        let id = Self::normalize(name);
        let mut tasks = self.tasks.lock().unwrap();
        let entry = tasks.entry(id).or_insert(0);
        *entry = (*entry).max(percent.min(100));
    }

    pub fn percent_of(&self, name: &str) -> Option<u8> {
        let id = Self::normalize(name);
        self.tasks.lock().unwrap().get(&id).copied()
    }

    /// Mean completion across all registered tasks.
    pub fn overall(&self) -> u8 {
        let tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() {
            return 0;
        }
        let sum: u32 = tasks.values().map(|p| *p as u32).sum();
        (sum / tasks.len() as u32) as u8
    }
}
