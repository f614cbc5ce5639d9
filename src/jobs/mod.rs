//! Job Orchestrator (spec.md §4.6).
//!
//! Grounded directly on the teacher's `infrastructure::jobs` module
//! (`JobId`/`JobStatus`/`JobPriority`/`Progress`/`JobHandle`/`JobManager`), simplified:
//! `sd-task-system`, `inventory`-based auto-registration and `rmp_serde` binary
//! persistence are dropped (see DESIGN.md) since jobs here need not survive a process
//! restart mid-flight — the Crawler's own cache/finalize discipline covers that.
//!
//! Progress fan-out uses `tokio::sync::broadcast` exactly as the teacher bridges an
//! internal channel to a `broadcast::Sender`; "drop slowest subscriber" is `broadcast`'s
//! native lagged-receiver semantics, not a bespoke bounded queue.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Crawl,
    Discovery,
    Geocode,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Crawl => "crawl",
            JobKind::Discovery => "discovery",
            JobKind::Geocode => "geocode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Started,
    Progress,
    Completed,
    Cancelled,
    Error,
}

/// Progress event schema (spec.md §6), stable across job kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "type")]
    pub phase: Phase,
    pub job_id: JobId,
    pub kind: String,
    pub current: u64,
    pub total: Option<u64>,
    pub message: Option<String>,
    pub current_item: Option<String>,
    pub counters: Option<Counters>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub discovered: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("a job of kind {0:?} is already running")]
    Busy(JobKind),
}

/// Cooperative cancellation token checked at every suspension point.
#[derive(Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

struct RunningJob {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A handle returned from `start`: the job's ID and its progress stream.
pub struct JobHandle {
    pub job_id: JobId,
    pub subscriber: broadcast::Receiver<Progress>,
}

/// Owns the registry of active jobs (at most one per kind) and the broadcast sender
/// each job's task uses to publish progress.
pub struct JobManager {
    running: Mutex<HashMap<JobKind, RunningJob>>,
    tx: broadcast::Sender<Progress>,
}

impl JobManager {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(1024);
        Arc::new(Self {
            running: Mutex::new(HashMap::new()),
            tx,
        })
    }

    /// Starts `kind` running `body`, which drives progress via the passed `Emitter` and
    /// observes cancellation via the passed `CancellationToken`. Fails with
    /// `JobError::Busy` if another job of the same kind is already running.
    pub async fn start<F, Fut>(self: &Arc<Self>, kind: JobKind, body: F) -> Result<JobHandle, JobError>
    where
        F: FnOnce(Emitter, CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().await;
        if running.contains_key(&kind) {
            return Err(JobError::Busy(kind));
        }

        let job_id = crate::shared::ulid::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let emitter = Emitter {
            tx: self.tx.clone(),
            job_id: job_id.clone(),
            kind,
        };
        let token = CancellationToken { rx: cancel_rx };
        let subscriber = self.tx.subscribe();

        emitter.emit(Phase::Started, 0, None, None, None, None);

        let manager = Arc::clone(self);
        let job_id_for_task = job_id.clone();
        let handle = tokio::spawn(async move {
            body(emitter, token).await;
            let mut running = manager.running.lock().await;
            running.remove(&kind);
            info!(job_id = %job_id_for_task, kind = kind.as_str(), "job slot released");
        });

        running.insert(kind, RunningJob { cancel_tx, handle });

        Ok(JobHandle { job_id, subscriber })
    }

    pub async fn is_running(&self, kind: JobKind) -> bool {
        self.running.lock().await.contains_key(&kind)
    }

    /// Cooperatively cancels the running job of `kind`, if any. Returns whether a job
    /// was found to cancel.
    pub async fn cancel(&self, kind: JobKind) -> bool {
        let running = self.running.lock().await;
        if let Some(job) = running.get(&kind) {
            let _ = job.cancel_tx.send(true);
            true
        } else {
            false
        }
    }

    /// Shutdown: cancels every active job, gives each a grace period to emit its
    /// terminal event, then forcibly aborts stragglers.
    pub async fn shutdown(&self, grace: Duration) {
        let handles: Vec<(JobKind, JoinHandle<()>)> = {
            let mut running = self.running.lock().await;
            running
                .drain()
                .map(|(kind, job)| {
                    let _ = job.cancel_tx.send(true);
                    (kind, job.handle)
                })
                .collect()
        };

        for (kind, handle) in handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(_) => info!(kind = kind.as_str(), "job shut down cleanly"),
                Err(_) => warn!(kind = kind.as_str(), "job did not shut down within grace period, dropping"),
            }
        }
    }
}

/// Handed to a running job's body to publish progress events.
#[derive(Clone)]
pub struct Emitter {
    tx: broadcast::Sender<Progress>,
    job_id: JobId,
    kind: JobKind,
}

impl Emitter {
    pub fn emit(
        &self,
        phase: Phase,
        current: u64,
        total: Option<u64>,
        message: Option<String>,
        current_item: Option<String>,
        counters: Option<Counters>,
    ) {
        let event = Progress {
            phase,
            job_id: self.job_id.clone(),
            kind: self.kind.as_str().to_string(),
            current,
            total,
            message,
            current_item,
            counters,
        };
        // A broadcast send fails only when there are zero subscribers, which is a
        // legitimate state (nobody listening yet) rather than an error.
        if self.tx.send(event).is_err() {
            return;
        }
    }

    pub fn progress(&self, current: u64, total: Option<u64>, current_item: Option<String>, counters: Counters) {
        self.emit(Phase::Progress, current, total, None, current_item, Some(counters));
    }

    pub fn completed(&self, current: u64, total: Option<u64>) {
        self.emit(Phase::Completed, current, total, None, None, None);
    }

    pub fn cancelled(&self, current: u64) {
        self.emit(Phase::Cancelled, current, None, None, None, None);
    }

    pub fn error(&self, current: u64, message: impl Into<String>) {
        error!(job_id = %self.job_id, kind = self.kind.as_str(), "job error");
        self.emit(Phase::Error, current, None, Some(message.into()), None, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_job_per_kind_runs_at_once() {
        let manager = JobManager::new();
        let gate = Arc::new(tokio::sync::Notify::new());
        let gate2 = gate.clone();

        let _handle = manager
            .start(JobKind::Crawl, move |_emitter, _token| async move {
                gate2.notified().await;
            })
            .await
            .unwrap();

        let result = manager
            .start(JobKind::Crawl, |_emitter, _token| async move {})
            .await;
        assert!(matches!(result, Err(JobError::Busy(JobKind::Crawl))));

        gate.notify_one();
    }

    #[tokio::test]
    async fn cancellation_emits_terminal_event_and_frees_slot() {
        let manager = JobManager::new();
        let handle = manager
            .start(JobKind::Crawl, |emitter, token| async move {
                loop {
                    if token.is_cancelled() {
                        emitter.cancelled(0);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();

        let mut subscriber = handle.subscriber;
        manager.cancel(JobKind::Crawl).await;

        let event = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event.phase, Phase::Started));
        let event = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event.phase, Phase::Cancelled));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!manager.is_running(JobKind::Crawl).await);

        let restart = manager
            .start(JobKind::Crawl, |_e, _t| async move {})
            .await;
        assert!(restart.is_ok());
    }
}
