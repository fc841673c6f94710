//! The two execution lanes: one serialized mutation lane that owns live
//! world state, and a bounded pool for background store I/O.
//!
//! The mutation lane is the only place world state is read or written.
//! Jobs run one at a time in submission order, so a job always sees the
//! effects of every job submitted before it. Its queue is bounded: once
//! `capacity` jobs are waiting, submitters wait for room instead of growing
//! the queue.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Errors from lane hand-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LaneError {
    /// The lane task has stopped and accepts no more work.
    #[error("mutation lane is closed")]
    Closed,
}

type Job<W> = Box<dyn FnOnce(&mut W) + Send + 'static>;

/// Handle to the serialized mutation lane owning a world of type `W`.
///
/// Cloning the handle is cheap. The lane task exits once every handle has
/// been dropped, handing the world back through its [`JoinHandle`].
pub struct MutationLane<W> {
    tx: mpsc::Sender<Job<W>>,
}

impl<W> Clone for MutationLane<W> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<W> std::fmt::Debug for MutationLane<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationLane")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<W: Send + 'static> MutationLane<W> {
    /// Move `world` into a new lane task queueing at most `capacity` jobs
    /// (at least one).
    pub fn spawn(world: W, capacity: usize) -> (Self, JoinHandle<W>) {
        let (tx, mut rx) = mpsc::channel::<Job<W>>(capacity.max(1));
        let handle = tokio::spawn(async move {
            let mut world = world;
            let mut executed: u64 = 0;
            while let Some(job) = rx.recv().await {
                job(&mut world);
                executed = executed.saturating_add(1);
            }
            tracing::debug!(executed, "Mutation lane drained");
            world
        });
        (Self { tx }, handle)
    }

    /// Enqueue a job without waiting for it to run. Waits for queue room
    /// when the lane is full.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::Closed`] if the lane task has stopped.
    pub async fn submit<F>(&self, job: F) -> Result<(), LaneError>
    where
        F: FnOnce(&mut W) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .await
            .map_err(|_closed| LaneError::Closed)
    }

    /// Enqueue a job and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::Closed`] if the lane stopped before the job ran.
    pub async fn call<F, T>(&self, job: F) -> Result<T, LaneError>
    where
        F: FnOnce(&mut W) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, wait) = oneshot::channel();
        self.submit(move |world| {
            // The caller may have stopped waiting; the job still ran.
            let _ = reply.send(job(world));
        })
        .await?;
        wait.await.map_err(|_closed| LaneError::Closed)
    }

    /// Whether the lane task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free queue slots right now.
    pub fn spare_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Bounded pool for background store work.
///
/// Each spawned future holds one permit for its whole run, so at most
/// `workers` of them make progress at a time.
#[derive(Debug, Clone)]
pub struct IoPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl IoPool {
    /// Create a pool with `workers` concurrent slots (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Configured concurrency bound.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Slots not currently in use.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` once a slot is free.
    ///
    /// The returned handle yields `None` if the pool was shut down before
    /// the task could start.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!("I/O pool shut down before task started");
                return None;
            };
            Some(task.await)
        })
    }

    /// Stop admitting new tasks. Running tasks finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
    }
}
