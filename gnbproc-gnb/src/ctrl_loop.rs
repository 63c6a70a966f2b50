//! Control Loops
//!
//! A [`ControlLoop`] is a single-consumer FIFO of procedure tasks. Each UE owns
//! one, so every procedure touching a UE runs to completion before the next one
//! for the same UE starts. Components also keep a "main" loop for cross-UE work
//! such as deferred UE removal.
//!
//! # Lifecycle
//!
//! ```text
//!   Running ──request_stop()──> Stopping ──queue drained──> Stopped
//! ```
//!
//! - **Running**: `schedule` accepts tasks, which run strictly one after the other.
//! - **Stopping**: `schedule` is rejected with [`ControlLoopError::Stopping`];
//!   tasks accepted earlier still run.
//! - **Stopped**: every accepted task finished and the stop futures resolved.
//!
//! A running task is never interrupted: `request_stop` only waits for the queue
//! to drain.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// A suspendable computation producing `T`, owned by whoever polls it.
pub type AsyncTask<T> = BoxFuture<'static, T>;

/// Commands consumed by the loop runner.
enum LoopCommand {
    /// Run a procedure to completion
    Run(AsyncTask<()>),
    /// Resolve the sender once all previously accepted tasks finished
    Stop(oneshot::Sender<()>),
}

/// Control loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Accepting and running tasks
    #[default]
    Running,
    /// Stop requested, draining tasks accepted before the request
    Stopping,
    /// Drained and terminated
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Running => write!(f, "Running"),
            LoopState::Stopping => write!(f, "Stopping"),
            LoopState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Reasons a task could not be scheduled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlLoopError {
    /// `request_stop` was already called on this loop
    #[error("control loop is stopping")]
    Stopping,
    /// Too many tasks pending
    #[error("control loop queue full ({0} tasks pending)")]
    QueueFull(usize),
    /// The runner terminated
    #[error("control loop closed")]
    Closed,
}

struct LoopShared {
    name: String,
    capacity: usize,
    /// Queued plus running tasks
    pending: AtomicUsize,
    stopping: AtomicBool,
    stopped: AtomicBool,
}

/// FIFO task scheduler with at most one task executing at a time.
///
/// Must be created from within a tokio runtime; the runner is spawned on
/// construction and exits when the loop is stopped or dropped.
pub struct ControlLoop {
    tx: mpsc::UnboundedSender<LoopCommand>,
    shared: Arc<LoopShared>,
}

impl ControlLoop {
    /// Creates a loop named `name` accepting up to `capacity` pending tasks.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(LoopShared {
            name: name.into(),
            capacity: capacity.max(1),
            pending: AtomicUsize::new(0),
            stopping: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        tokio::spawn(run_loop(rx, shared.clone()));
        Self { tx, shared }
    }

    /// Enqueues a task. It starts immediately if the loop is idle, otherwise
    /// after every task scheduled before it has finished.
    pub fn schedule<F>(&self, task: F) -> Result<(), ControlLoopError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shared.stopping.load(Ordering::Acquire) {
            return Err(ControlLoopError::Stopping);
        }

        let pending = self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if pending >= self.shared.capacity {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("{}: rejecting task, {} tasks pending", self.shared.name, pending);
            return Err(ControlLoopError::QueueFull(pending));
        }

        if self.tx.send(LoopCommand::Run(task.boxed())).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(ControlLoopError::Closed);
        }

        trace!("{}: task scheduled ({} pending)", self.shared.name, pending + 1);
        Ok(())
    }

    /// Enqueues a task producing a value. The returned receiver resolves with
    /// the value once the task ran.
    pub fn schedule_with_result<T, F>(
        &self,
        task: F,
    ) -> Result<oneshot::Receiver<T>, ControlLoopError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        self.schedule(async move {
            let _ = result_tx.send(task.await);
        })?;
        Ok(result_rx)
    }

    /// Stops accepting new tasks and returns a future that resolves once every
    /// previously accepted task finished. Calling it again, or on a stopped
    /// loop, returns a future that resolves as soon as the loop is drained.
    pub fn request_stop(&self) -> impl Future<Output = ()> + Send + 'static {
        let first_request = !self.shared.stopping.swap(true, Ordering::AcqRel);
        if first_request {
            debug!(
                "{}: stop requested with {} pending tasks",
                self.shared.name,
                self.nof_pending_tasks()
            );
        }

        let (done_tx, done_rx) = oneshot::channel();
        let sent = self.tx.send(LoopCommand::Stop(done_tx)).is_ok();
        async move {
            if sent {
                // A dropped sender also means the runner is gone.
                let _ = done_rx.await;
            }
        }
    }

    /// Returns true if no task is queued or executing.
    pub fn is_drained(&self) -> bool {
        self.nof_pending_tasks() == 0
    }

    /// Returns the number of queued plus executing tasks.
    pub fn nof_pending_tasks(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> LoopState {
        if self.shared.stopped.load(Ordering::Acquire) {
            LoopState::Stopped
        } else if self.shared.stopping.load(Ordering::Acquire) {
            LoopState::Stopping
        } else {
            LoopState::Running
        }
    }

    /// Returns the loop name used in logs.
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("pending", &self.nof_pending_tasks())
            .finish()
    }
}

async fn run_loop(mut rx: mpsc::UnboundedReceiver<LoopCommand>, shared: Arc<LoopShared>) {
    trace!("{}: control loop started", shared.name);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            LoopCommand::Run(task) => {
                task.await;
                shared.pending.fetch_sub(1, Ordering::AcqRel);
            }
            LoopCommand::Stop(done) => {
                rx.close();
                // Tasks that raced the stop flag were accepted; run them too.
                let mut waiters = vec![done];
                while let Ok(cmd) = rx.try_recv() {
                    match cmd {
                        LoopCommand::Run(task) => {
                            task.await;
                            shared.pending.fetch_sub(1, Ordering::AcqRel);
                        }
                        LoopCommand::Stop(done) => waiters.push(done),
                    }
                }
                shared.stopped.store(true, Ordering::Release);
                for done in waiters {
                    let _ = done.send(());
                }
                debug!("{}: control loop stopped", shared.name);
                return;
            }
        }
    }

    shared.stopped.store(true, Ordering::Release);
    trace!("{}: control loop closed", shared.name);
}
