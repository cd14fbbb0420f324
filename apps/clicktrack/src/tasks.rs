//! # Task Queue
//!
//! In-process queue for the writes that must not delay a response.
//!
//! Handlers enqueue a [`Task`] and answer immediately; a single [`Worker`]
//! applies tasks to the [`Store`] in arrival order. Every task carries a fresh
//! id, and the store refuses an id it has already applied, so retries after a
//! transient failure never double count.
//!
//! ```text
//! handler --try_send--> [ bounded mpsc ] --recv--> Worker --spawn_blocking--> Store
//! ```

use clicktrack_core::{Click, ClickOutcome, SignUp, Store, TrackerCache, TrackerId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS};

/// Tracker cache shared by handlers and the worker.
pub type SharedCache = Arc<Mutex<TrackerCache>>;

// =============================================================================
// TASKS
// =============================================================================

/// Deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Increment a tracker's count and log the click.
    RecordClick {
        id: Uuid,
        tracker_id: TrackerId,
        click: Click,
    },
    /// Store a sign-up.
    CreateSignUp { id: Uuid, signup: SignUp },
}

impl Task {
    #[must_use]
    pub fn record_click(tracker_id: TrackerId, click: Click) -> Self {
        Self::RecordClick {
            id: Uuid::new_v4(),
            tracker_id,
            click,
        }
    }

    #[must_use]
    pub fn create_signup(signup: SignUp) -> Self {
        Self::CreateSignUp {
            id: Uuid::new_v4(),
            signup,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::RecordClick { id, .. } | Self::CreateSignUp { id, .. } => *id,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RecordClick { .. } => "record_click",
            Self::CreateSignUp { .. } => "create_signup",
        }
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("task queue is full")]
    Full,
    #[error("task queue is closed")]
    Closed,
}

/// Sending half of the task queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` pending tasks.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a task without waiting. Returns the task id.
    pub fn enqueue(&self, task: Task) -> Result<Uuid, EnqueueError> {
        let id = task.id();
        self.sender.try_send(task).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })?;
        Ok(id)
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// What happened to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Applied,
    /// The task id had already been applied.
    Duplicate,
    /// Given up after `attempts` tries.
    Failed { attempts: u32, error: String },
}

/// Applies queued tasks to the store.
#[derive(Debug, Clone)]
pub struct Worker {
    store: Arc<Store>,
    cache: SharedCache,
    max_attempts: u32,
    backoff: Duration,
}

impl Worker {
    #[must_use]
    pub fn new(store: Arc<Store>, cache: SharedCache) -> Self {
        Self {
            store,
            cache,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    /// Retry policy: up to `max_attempts` tries, sleeping `backoff * attempt`
    /// between them.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Run the worker on the current runtime until every sender is dropped.
    pub fn spawn(self, receiver: mpsc::Receiver<Task>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    pub async fn run(self, mut receiver: mpsc::Receiver<Task>) {
        info!("task worker started");
        let mut processed: u64 = 0;
        while let Some(task) = receiver.recv().await {
            self.process(task).await;
            processed = processed.saturating_add(1);
        }
        info!(processed, "task worker stopped");
    }

    /// Apply one task, retrying transient storage failures.
    pub async fn process(&self, task: Task) -> TaskOutcome {
        let task = Arc::new(task);
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let store = Arc::clone(&self.store);
            let job = Arc::clone(&task);
            let result = tokio::task::spawn_blocking(move || apply(&store, &job)).await;

            match result {
                Ok(Ok(Some(effect))) => {
                    self.after_apply(effect);
                    debug!(task_id = %task.id(), kind = task.kind(), attempt, "task applied");
                    return TaskOutcome::Applied;
                }
                Ok(Ok(None)) => {
                    debug!(task_id = %task.id(), kind = task.kind(), "duplicate task skipped");
                    return TaskOutcome::Duplicate;
                }
                Ok(Err(err)) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        task_id = %task.id(),
                        kind = task.kind(),
                        attempt,
                        error = %err,
                        "task failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Ok(Err(err)) => {
                    error!(task_id = %task.id(), kind = task.kind(), attempt, error = %err, "task dropped");
                    return TaskOutcome::Failed {
                        attempts: attempt,
                        error: err.to_string(),
                    };
                }
                Err(join_err) => {
                    error!(task_id = %task.id(), kind = task.kind(), error = %join_err, "task aborted");
                    return TaskOutcome::Failed {
                        attempts: attempt,
                        error: join_err.to_string(),
                    };
                }
            }
        }
    }

    fn after_apply(&self, effect: Effect) {
        // A cached tracker keeps serving redirects; only its count moves.
        let Effect::Counted { tracker_id, count } = effect else {
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.update(&tracker_id, |tracker| tracker.count = count);
        }
    }
}

/// What an applied task changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Counted { tracker_id: TrackerId, count: u64 },
    Stored,
}

/// Apply a task. `Ok(None)` means it had been applied before.
fn apply(store: &Store, task: &Task) -> clicktrack_core::Result<Option<Effect>> {
    match task {
        Task::RecordClick {
            id,
            tracker_id,
            click,
        } => match store.record_click(&id.to_string(), *tracker_id, click)? {
            ClickOutcome::Recorded { count } => Ok(Some(Effect::Counted {
                tracker_id: *tracker_id,
                count,
            })),
            ClickOutcome::Duplicate => Ok(None),
        },
        Task::CreateSignUp { id, signup } => Ok(store
            .add_signup(&id.to_string(), signup)?
            .then_some(Effect::Stored)),
    }
}
