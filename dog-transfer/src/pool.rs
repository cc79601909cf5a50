use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::{TransferError, TransferResult};

/// One unit of part-level work handed to a [`WorkerPool`]
pub type PoolTask<T> = BoxFuture<'static, TransferResult<T>>;

/// Runs part-level tasks with bounded concurrency.
///
/// `run_all` returns one result per submitted task, in completion order. It
/// does not return before every task has finished; a failing task never
/// cancels its siblings.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    async fn run_all<T>(&self, tasks: Vec<PoolTask<T>>) -> Vec<TransferResult<T>>
    where
        T: Send + 'static;

    /// Upper bound on tasks running at once
    fn max_concurrency(&self) -> usize;
}

/// Pool backed by Tokio tasks, gated by a fair semaphore.
///
/// The permits are shared by every `run_all` call on the same pool, so a
/// manager running several transfers at once still keeps at most
/// `max_concurrency` part operations in flight.
#[derive(Clone)]
pub struct TokioPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl TokioPool {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Permits not currently held by a running task
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl WorkerPool for TokioPool {
    async fn run_all<T>(&self, tasks: Vec<PoolTask<T>>) -> Vec<TransferResult<T>>
    where
        T: Send + 'static,
    {
        let mut set = JoinSet::new();
        let total = tasks.len();

        for task in tasks {
            let permits = self.permits.clone();
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| TransferError::worker("worker pool closed"))?;
                task.await
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            results.push(joined.unwrap_or_else(|e| Err(TransferError::worker(e.to_string()))));
        }
        results
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

/// Runs tasks one after another on the calling task, in submission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

#[async_trait]
impl WorkerPool for InlinePool {
    async fn run_all<T>(&self, tasks: Vec<PoolTask<T>>) -> Vec<TransferResult<T>>
    where
        T: Send + 'static,
    {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await);
        }
        results
    }

    fn max_concurrency(&self) -> usize {
        1
    }
}
