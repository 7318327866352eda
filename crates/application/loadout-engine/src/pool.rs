use std::future::Future;

use futures::future::join_all;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool size must be at least 1, got {0}")]
    InvalidPoolSize(usize),
}

/// Bounded-parallelism batch executor. Items are split into
/// `ceil(n / pool_size)` sequential batches; within a batch every operation
/// runs concurrently and the whole batch settles before the next one starts.
/// A failing item never aborts its siblings or later batches.
pub struct BatchPool {
    pool_size: usize,
}

impl BatchPool {
    pub fn new(pool_size: usize) -> Result<Self, PoolError> {
        if pool_size < 1 {
            return Err(PoolError::InvalidPoolSize(pool_size));
        }
        Ok(Self { pool_size })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run `op` over every item, returning one result per input item in the
    /// original input order. Empty input returns immediately without
    /// scheduling anything.
    pub async fn run<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        on_progress: Option<&(dyn Fn(usize, usize) + Send + Sync)>,
        op: F,
    ) -> Vec<Result<R, E>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        if total == 0 {
            return results;
        }

        let mut iter = items.into_iter();
        loop {
            let batch: Vec<T> = iter.by_ref().take(self.pool_size).collect();
            if batch.is_empty() {
                break;
            }
            // join_all is an all-settled join: every future runs to
            // completion regardless of sibling failures.
            let settled = join_all(batch.into_iter().map(&op)).await;
            results.extend(settled);
            if let Some(cb) = on_progress {
                cb(results.len(), total);
            }
        }
        results
    }
}

/// Separate fulfilled values from rejections, keeping each rejection's
/// original input index.
pub fn split_settled<R, E>(results: Vec<Result<R, E>>) -> (Vec<R>, Vec<(usize, E)>) {
    let mut fulfilled = Vec::new();
    let mut rejected = Vec::new();
    for (index, res) in results.into_iter().enumerate() {
        match res {
            Ok(v) => fulfilled.push(v),
            Err(e) => rejected.push((index, e)),
        }
    }
    (fulfilled, rejected)
}
