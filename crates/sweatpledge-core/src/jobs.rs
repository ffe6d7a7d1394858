//! Deferred-job seam for call execution.
//!
//! The engine never dials anyone: it enqueues a job with a delay and a
//! dedupe key, and an external at-least-once runner fires it. Everything
//! the engine needs from that runner fits in the [`JobRunner`] trait; the
//! in-memory implementation backs the CLI and the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::call::CallType;
use crate::clock::lock;

/// Payload for a deferred call-initiation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallJob {
    pub call_id: String,
    pub user_id: String,
    pub call_type: CallType,
    pub scheduled_at: DateTime<Utc>,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Job accepted for future execution.
    Scheduled,
    /// The requested time was already past; the job was dispatched with
    /// zero delay instead of being dropped.
    Immediate,
    /// A pending job already holds this dedupe key. Idempotent no-op.
    AlreadyScheduled,
}

/// External job runner. At-least-once delivery; duplicate dedupe keys must
/// not produce duplicate pending jobs.
pub trait JobRunner: Send + Sync {
    fn enqueue(&self, job: CallJob, delay: Duration, dedupe_key: &str) -> Enqueued;

    /// Remove a not-yet-fired job. Returns whether anything was removed.
    fn cancel(&self, dedupe_key: &str) -> bool;
}

/// A job held by the in-memory runner.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub job: CallJob,
    pub due_at: DateTime<Utc>,
    pub dedupe_key: String,
}

/// In-process runner used by the CLI and tests. Pending jobs sit in a map
/// keyed by dedupe key until drained.
#[derive(Default)]
pub struct InMemoryJobRunner {
    pending: Mutex<HashMap<String, PendingJob>>,
}

impl InMemoryJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs currently waiting, in no particular order.
    pub fn pending(&self) -> Vec<PendingJob> {
        lock(&self.pending).values().cloned().collect()
    }

    /// Remove and return every job due at or before `now`, soonest first.
    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<PendingJob> {
        let mut guard = lock(&self.pending);
        let due_keys: Vec<String> = guard
            .values()
            .filter(|p| p.due_at <= now)
            .map(|p| p.dedupe_key.clone())
            .collect();
        let mut due: Vec<PendingJob> = due_keys
            .into_iter()
            .filter_map(|k| guard.remove(&k))
            .collect();
        due.sort_by_key(|p| p.due_at);
        due
    }
}

impl JobRunner for InMemoryJobRunner {
    fn enqueue(&self, job: CallJob, delay: Duration, dedupe_key: &str) -> Enqueued {
        let mut guard = lock(&self.pending);
        if guard.contains_key(dedupe_key) {
            return Enqueued::AlreadyScheduled;
        }
        let immediate = delay <= Duration::zero();
        // The fire time is the job's scheduled_at; a past time is already
        // due and comes out of the next drain.
        let due_at = job.scheduled_at;
        guard.insert(
            dedupe_key.to_string(),
            PendingJob {
                job,
                due_at,
                dedupe_key: dedupe_key.to_string(),
            },
        );
        if immediate {
            Enqueued::Immediate
        } else {
            Enqueued::Scheduled
        }
    }

    fn cancel(&self, dedupe_key: &str) -> bool {
        lock(&self.pending).remove(dedupe_key).is_some()
    }
}
