//! The engine's designated thread.
//!
//! The billing client is not thread-safe, so every connection transition,
//! request callback, client call and listener notification is funnelled
//! through one serial executor. Jobs run one at a time, in the order they were
//! posted. An async job holds the executor until its future completes.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::debug;

enum Job {
    Run(Box<dyn FnOnce() + Send + 'static>),
    Await(BoxFuture<'static, ()>),
}

/// Handle to a serial executor running on the current Tokio runtime.
///
/// Cloning the handle is cheap; the executor stops once every handle is gone
/// and the pending jobs have run.
#[derive(Clone, Debug)]
pub struct MainThread {
    sender: mpsc::UnboundedSender<Job>,
}

impl MainThread {
    /// Start the executor.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match job {
                    Job::Run(job) => job(),
                    Job::Await(future) => future.await,
                }
            }
            debug!("Main thread executor stopped");
        });
        Self { sender }
    }

    /// Queue `job`. Returns false if the executor has stopped.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Job::Run(Box::new(job))).is_ok()
    }

    /// Queue `future`. No other job runs until it completes.
    pub fn post_async<Fut>(&self, future: Fut) -> bool
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sender.send(Job::Await(Box::pin(future))).is_ok()
    }

    /// Queue `job` once `delay` has elapsed.
    pub fn post_delayed<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let main = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            main.post(job);
        });
    }
}
