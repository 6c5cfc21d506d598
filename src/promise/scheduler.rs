use crate::core::{ModelError, Result, lock_unpoisoned};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Defers execution of a callback to a later turn of control flow.
///
/// Implementations must guarantee that a task never runs while the
/// `schedule` call that enqueued it is still on the stack, that tasks run
/// in FIFO order relative to other tasks scheduled on the same instance,
/// and that every accepted task eventually runs.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

/// Deterministic scheduler backed by an explicit task queue.
///
/// Tasks accumulate until the embedder pumps the queue with
/// [`run_until_idle`](QueueScheduler::run_until_idle). Tasks enqueued while
/// the queue is draining run within the same pump, after everything that
/// was already queued.
pub struct QueueScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl QueueScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Runs queued tasks until the queue is empty, returning how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        loop {
            // The lock is released before the task runs so tasks may
            // schedule follow-up work.
            let next = lock_unpoisoned(&self.queue).pop_front();
            match next {
                Some(task) => {
                    task();
                    executed += 1;
                }
                None => break,
            }
        }
        executed
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        lock_unpoisoned(&self.queue).len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, task: Task) {
        lock_unpoisoned(&self.queue).push_back(task);
    }
}

/// Scheduler that drains tasks on a spawned Tokio worker.
///
/// Tasks are fed through an unbounded channel and executed one at a time in
/// send order. Must be created inside a Tokio runtime.
pub struct WorkerScheduler {
    task_tx: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerScheduler {
    /// Spawns the drain loop and returns a handle to the scheduler.
    pub fn spawn() -> Arc<Self> {
        let (task_tx, mut task_rx) = mpsc::unbounded_channel::<Task>();

        let join_handle = tokio::spawn(async move {
            while let Some(task) = task_rx.recv().await {
                task();
            }
        });

        Arc::new(Self {
            task_tx: Mutex::new(Some(task_tx)),
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    /// Closes the task channel and waits for the worker to finish.
    ///
    /// Tasks already queued still run before the worker exits. Tasks
    /// scheduled after shutdown are silently discarded.
    pub async fn shutdown(&self) -> Result<()> {
        let task_tx = lock_unpoisoned(&self.task_tx).take();
        drop(task_tx);

        let join_handle = lock_unpoisoned(&self.join_handle).take();
        if let Some(join_handle) = join_handle {
            join_handle
                .await
                .map_err(|err| ModelError::Scheduler(format!("worker join: {}", err)))?;
        }
        Ok(())
    }
}

impl Scheduler for WorkerScheduler {
    fn schedule(&self, task: Task) {
        if let Some(task_tx) = lock_unpoisoned(&self.task_tx).as_ref() {
            let _ = task_tx.send(task);
        }
    }
}

impl Drop for WorkerScheduler {
    fn drop(&mut self) {
        if let Some(task_tx) = lock_unpoisoned(&self.task_tx).take() {
            drop(task_tx);
        }
        if let Some(join_handle) = lock_unpoisoned(&self.join_handle).take() {
            join_handle.abort();
        }
    }
}
