//! A bounded worker pool: `max_workers` long-running tasks pop jobs off a
//! shared queue and run them to completion, with a `join` that waits for
//! drain or times out and cancels everything in flight. Grounded on
//! `eidaws.utils.worker.Pool`, mapped onto `tokio::task::JoinSet` +
//! `tokio::sync::mpsc` the way spec.md's concurrency model describes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, thiserror::Error)]
#[error("worker pool timed out waiting for {0} job(s) to drain")]
pub struct PoolTimeoutError(pub usize);

/// `max_workers` tasks each loop pulling `Job`s off `rx` until the channel
/// closes. `submit` sends a job; `join` closes the sender, waits for every
/// worker to drain its queue (or `timeout` to elapse, whichever is first),
/// and on timeout aborts every still-running worker task.
pub struct Pool {
    tx: mpsc::UnboundedSender<Job>,
    workers: JoinSet<()>,
    pending: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl Pool {
    pub fn new(max_workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
        let pending = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for _ in 0..max_workers.max(1) {
            let rx = rx.clone();
            let pending = pending.clone();
            workers.spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => {
                            job.await;
                            pending.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                        }
                        None => break,
                    }
                }
            });
        }

        Self { tx, workers, pending }
    }

    /// Enqueue a job. Panics if `join` has already been called (the
    /// sending half is dropped then, matching the "submit after close is a
    /// programmer error" contract of the original pool).
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.tx.send(Box::pin(job)).expect("pool already joined");
    }

    /// Close the submission queue and wait for every worker to drain its
    /// backlog, or for `timeout` to elapse. On timeout, every worker task is
    /// aborted and a [`PoolTimeoutError`] is returned.
    pub async fn join(mut self, timeout: Option<Duration>) -> Result<(), PoolTimeoutError> {
        drop(self.tx);

        let drain = async {
            while self.workers.join_next().await.is_some() {}
        };

        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, drain).await {
                Ok(()) => Ok(()),
                Err(_) => {
                    let remaining = self.pending.load(std::sync::atomic::Ordering::SeqCst);
                    self.workers.abort_all();
                    Err(PoolTimeoutError(remaining))
                }
            },
            None => {
                drain.await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_every_submitted_job() {
        let pool = Pool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn join_times_out_on_a_stuck_worker() {
        let pool = Pool::new(1);
        pool.submit(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        let result = pool.join(Some(Duration::from_millis(50))).await;
        assert!(result.is_err());
    }
}
