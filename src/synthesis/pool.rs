/*!
 * Bounded worker pool.
 *
 * At most `capacity` tasks run at once; the rest wait for a permit. The
 * semaphore lives in the pool, so concurrent `run_all` calls on the same
 * pool share one budget.
 */

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool admitting `capacity` tasks at once (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `task` for every item and return the results in input order
    pub async fn run_all<I, F, Fut, T>(&self, items: I, mut task: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let work = task(item);
                let semaphore = self.semaphore.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    (index, work.await)
                }
            })
            .buffer_unordered(self.capacity)
            .collect::<Vec<_>>()
            .await;

        // Completion order is arbitrary
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
