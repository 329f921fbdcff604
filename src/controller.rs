//! The generic worker pool that drains a work queue into a [`Control`].

use std::{future::Future, panic, sync::Arc};

use futures::future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    control::Control,
    queue::WorkQueue,
    store::{HasSynced, Object, Objects},
    subscriber::QualifiedName,
    Result,
};

/// A spawned task that is told to stop through its own token.
pub(crate) struct CancellableTask<T> {
    join_handle: JoinHandle<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> CancellableTask<T> {
    pub(crate) fn spawn<F>(token: CancellationToken, fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            join_handle: tokio::spawn(fut),
            token,
        }
    }

    /// Cancels the task and waits for it, re-raising its panic if it had one.
    ///
    /// Returns `None` if the task was aborted.
    pub(crate) async fn cancel(self) -> Option<T> {
        self.token.cancel();
        match self.join_handle.await {
            Ok(output) => Some(output),
            Err(err) => match err.try_into_panic() {
                Ok(panic) => panic::resume_unwind(panic),
                Err(_) => None,
            },
        }
    }
}

/// Syncs objects of kind `K` whose keys are queued, with a fixed number of workers.
///
/// A key is handed to one worker at a time. Failed keys are re-queued
/// with backoff; a key whose object is gone is treated as processed.
pub struct Controller<K> {
    name: String,
    queue: WorkQueue<QualifiedName>,
    objects: Arc<dyn Objects<K>>,
    control: Arc<dyn Control<K>>,
    caches: Vec<Arc<dyn HasSynced>>,
}

impl<K: Object> Controller<K> {
    pub fn new(
        name: impl Into<String>,
        queue: WorkQueue<QualifiedName>,
        objects: Arc<dyn Objects<K>>,
        control: Arc<dyn Control<K>>,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            objects,
            control,
            caches: Vec::new(),
        }
    }

    /// No worker starts before `cache` has synced.
    pub fn wait_for(mut self, cache: Arc<dyn HasSynced>) -> Self {
        self.caches.push(cache);
        self
    }

    /// Runs until `token` is cancelled.
    ///
    /// On cancellation the queue is shut down and every worker finishes
    /// the key it holds before this returns.
    pub async fn run(self, workers: usize, token: CancellationToken) -> Result<()> {
        let Self {
            name,
            queue,
            objects,
            control,
            caches,
        } = self;

        log::info!("Waiting for {name} caches to sync");
        tokio::select! {
            () = token.cancelled() => {
                queue.shut_down();
                return Ok(());
            }
            synced = future::try_join_all(caches.iter().map(|cache| cache.wait_synced())) => {
                synced?;
            }
        }

        log::info!("Starting {workers} {name} workers");
        let worker = Arc::new(Worker {
            name: name.clone(),
            queue: queue.clone(),
            objects,
            control,
        });
        let tasks: Vec<_> = (0..workers.max(1))
            .map(|_| {
                CancellableTask::spawn(token.child_token(), Arc::clone(&worker).run())
            })
            .collect();

        token.cancelled().await;
        log::info!("Shutting down {name} workers");
        queue.shut_down();
        for task in tasks {
            task.cancel().await;
        }
        Ok(())
    }
}

struct Worker<K> {
    name: String,
    queue: WorkQueue<QualifiedName>,
    objects: Arc<dyn Objects<K>>,
    control: Arc<dyn Control<K>>,
}

impl<K: Object> Worker<K> {
    /// Processes keys until the queue is shut down and drained.
    async fn run(self: Arc<Self>) {
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
        }
    }

    async fn process(&self, key: &QualifiedName) {
        match self.sync(key).await {
            Ok(()) => self.queue.forget(key),
            Err(err) => {
                log::error!("Error syncing {} {key}, requeuing: {err}", self.name);
                self.queue.add_rate_limited(key.clone());
            }
        }
        self.queue.done(key);
    }

    async fn sync(&self, key: &QualifiedName) -> Result<()> {
        let Some(object) = self.objects.get(key.namespace_or_default(), &key.name) else {
            log::debug!("{} {key} has been deleted", self.name);
            return Ok(());
        };
        log::debug!("Syncing {} {key}", self.name);
        self.control.sync(&object).await
    }
}
