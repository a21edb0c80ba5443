use model::domain::worker::Worker;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("No worker is available in the pool")]
    EmptyPool,
    #[error("Worker {0} is not ready and cannot join the pool")]
    NotReady(String),
}

/// Ready workers of one function, in round-robin order: the head serves the
/// next call.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: Mutex<VecDeque<Worker>>,
}

impl WorkerPool {
    pub fn new() -> Self { Self::default() }

    pub async fn add(&self, worker: Worker) -> Result<(), Error> {
        if !worker.is_ready() {
            return Err(Error::NotReady(worker.container_id));
        }
        trace!("Worker {} joins the pool", worker.container_id);
        self.workers.lock().await.push_back(worker);
        Ok(())
    }

    /// Return the head and rotate it to the tail.
    pub async fn next(&self) -> Result<Worker, Error> {
        let mut workers = self.workers.lock().await;
        let worker = workers.pop_front().ok_or(Error::EmptyPool)?;
        workers.push_back(worker.clone());
        Ok(worker)
    }

    pub async fn size(&self) -> usize { self.workers.lock().await.len() }

    /// Take every worker out, leaving the pool empty.
    pub async fn drain(&self) -> Vec<Worker> {
        self.workers.lock().await.drain(..).collect()
    }

    /// Snapshot in rotation order.
    pub async fn workers(&self) -> Vec<Worker> {
        self.workers.lock().await.iter().cloned().collect()
    }
}
