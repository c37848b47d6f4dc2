//! Bounded task queue drained by a fixed pool of workers.
//!
//! ```text
//! submit ──try_send──▶ [ queue (capacity N) ] ──recv──▶ worker 1..W
//!                                                        │
//!                                   timeout(process) ◀───┘
//! ```
//!
//! Submissions never wait for queue space: a full queue is reported to the
//! submitter. Each task's pipeline runs in its own tokio task under the
//! configured deadline; on expiry that task is aborted and the job fails
//! with [`GrimoireError::Timeout`]. A panic inside the pipeline fails the job
//! with [`GrimoireError::Internal`] and leaves the worker alive.

use crate::error::GrimoireError;
use crate::job::Task;
use crate::pipeline::Pipeline;
use crate::store::JobStore;
use async_channel::{Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct WorkerPool {
    sender: Sender<Task>,
    capacity: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `pipeline.config().workers` workers. Must be called inside a
    /// tokio runtime.
    pub fn spawn(pipeline: Arc<Pipeline>, store: Arc<JobStore>) -> Self {
        let workers = pipeline.config().workers.max(1);
        let capacity = pipeline.config().queue_capacity.max(1);
        let (sender, receiver) = async_channel::bounded(capacity);

        let handles = (0..workers)
            .map(|n| {
                tokio::spawn(worker_loop(
                    n,
                    receiver.clone(),
                    Arc::clone(&pipeline),
                    Arc::clone(&store),
                ))
            })
            .collect();
        info!("Started {} workers (queue capacity {})", workers, capacity);

        Self {
            sender,
            capacity,
            handles: Mutex::new(handles),
        }
    }

    /// Queue a task without waiting.
    pub fn enqueue(&self, task: Task) -> Result<(), GrimoireError> {
        self.sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => GrimoireError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => GrimoireError::ShutDown,
        })
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    /// Stop accepting tasks, let the workers drain everything already
    /// queued, then wait for them to exit. Later calls return immediately.
    pub async fn shutdown(&self) {
        self.sender.close();
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return;
        }
        info!("Draining {} queued tasks", self.sender.len());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }
        info!("All workers stopped");
    }
}

async fn worker_loop(
    n: usize,
    receiver: Receiver<Task>,
    pipeline: Arc<Pipeline>,
    store: Arc<JobStore>,
) {
    debug!("Worker {} started", n);
    // recv fails only once the queue is closed *and* empty
    while let Ok(task) = receiver.recv().await {
        run_task(&pipeline, &store, task).await;
    }
    debug!("Worker {} stopped", n);
}

async fn run_task(pipeline: &Arc<Pipeline>, store: &JobStore, task: Task) {
    let Some(job) = store.get(task.job_id) else {
        debug!("Job {} vanished before processing; skipping", task.job_id);
        return;
    };

    let deadline = pipeline.config().task_timeout();
    let mut processing = {
        let pipeline = Arc::clone(pipeline);
        let job = Arc::clone(&job);
        tokio::spawn(async move { pipeline.process(&job, &task.decklist).await })
    };

    let outcome = match tokio::time::timeout(deadline, &mut processing).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(GrimoireError::Internal(format!(
            "Pipeline task panicked: {}",
            join_error
        ))),
        Err(_) => {
            processing.abort();
            warn!("Job {} exceeded its {:?} deadline", job.id(), deadline);
            Err(GrimoireError::Timeout {
                secs: deadline.as_secs(),
            })
        }
    };
    pipeline.settle(&job, outcome);
}
