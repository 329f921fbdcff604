use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt, StreamExt};
use kube_client::{
    api::{DeleteParams, PostParams},
    Api, Client,
};
use kube_core::ResourceExt;
use kube_runtime::{
    reflector::{self, ObjectRef, Store},
    watcher, WatchStreamExt,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::is_status,
    store::{HasSynced, Object, Objects, Selector},
    Error, Result,
};

/// [`Objects`] backed by a reflector cache and the apiserver.
pub struct KubeObjects<K: Object> {
    client: Client,
    store: Store<K>,
}

impl<K: Object> KubeObjects<K> {
    /// Starts a watch on `K` (all namespaces if `namespace` is `None`)
    /// that keeps a local cache up to date.
    ///
    /// `on_change` is called for every applied or deleted object.
    /// It is a notification only: the object it receives may already be stale.
    pub fn watch<F>(
        client: Client,
        namespace: Option<&str>,
        token: CancellationToken,
        on_change: F,
    ) -> Self
    where
        F: Fn(&K) + Send + 'static,
    {
        let api: Api<K> = match namespace {
            Some(namespace) => Api::namespaced(client.clone(), namespace),
            None => Api::all(client.clone()),
        };
        let writer = reflector::store::Writer::default();
        let store = writer.as_reader();

        let mut events = reflector::reflector(
            writer,
            watcher(api, watcher::Config::default()).default_backoff(),
        )
        .touched_objects()
        .boxed();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.next() => match event {
                        Some(Ok(object)) => on_change(&object),
                        Some(Err(err)) => log::warn!("Watch on {} failed: {err}", K::kind(&())),
                        None => break,
                    },
                }
            }
            log::debug!("Stopped watching {}", K::kind(&()));
        });

        Self { client, store }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl<K: Object> Objects<K> for KubeObjects<K> {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.store.get(&ObjectRef::new(name).within(namespace))
    }

    fn list(&self, namespace: &str, selector: &Selector) -> Vec<Arc<K>> {
        self.store
            .state()
            .into_iter()
            .filter(|object| {
                object.namespace().as_deref() == Some(namespace) && selector.matches(object.labels())
            })
            .collect()
    }

    fn create<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>> {
        async move {
            let created = self
                .api(namespace)
                .create(&PostParams::default(), object)
                .await?;
            Ok(created)
        }
        .boxed()
    }

    fn replace<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>> {
        async move {
            let replaced = self
                .api(namespace)
                .replace(&object.name_any(), &PostParams::default(), object)
                .await?;
            Ok(replaced)
        }
        .boxed()
    }

    fn replace_status<'a>(
        &'a self,
        namespace: &'a str,
        object: &'a K,
    ) -> BoxFuture<'a, Result<K>> {
        async move {
            let data = serde_json::to_vec(object)?;
            let replaced = self
                .api(namespace)
                .replace_status(&object.name_any(), &PostParams::default(), data)
                .await?;
            Ok(replaced)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            match self
                .api(namespace)
                .delete(name, &DeleteParams::default())
                .await
            {
                Ok(_) => Ok(()),
                Err(err) if is_status(&err, 404) => Ok(()),
                Err(err) => Err(err.into()),
            }
        }
        .boxed()
    }
}

impl<K: Object> HasSynced for KubeObjects<K> {
    fn wait_synced(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            self.store
                .wait_until_ready()
                .await
                .map_err(|_| Error::CacheSync(K::kind(&()).into_owned()))
        }
        .boxed()
    }
}
