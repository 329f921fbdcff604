//! An in-memory [`Objects`] used by tests in place of the apiserver.
//!
//! Reads and writes share one map, so the "cache" is never stale.
//! Every mutating call is appended to a shared [`Tracker`].

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{future::BoxFuture, FutureExt};
use kube_core::{ErrorResponse, ResourceExt};
use parking_lot::Mutex;

use crate::{
    store::{HasSynced, Object, Objects, Selector},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub verb: Verb,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Mutations made through every store sharing this tracker, in call order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tracker(Arc<Mutex<Vec<Recorded>>>);

impl Tracker {
    fn record(&self, verb: Verb, kind: &str, namespace: &str, name: &str) {
        self.0.lock().push(Recorded {
            verb,
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    }

    pub fn actions(&self) -> Vec<Recorded> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn count(&self, verb: Verb, kind: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|action| action.verb == verb && action.kind == kind)
            .count()
    }
}

pub(crate) struct MemoryObjects<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    tracker: Tracker,
    next_uid: AtomicU64,
    fail_writes: Mutex<Option<u16>>,
}

impl<K: Object> MemoryObjects<K> {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            tracker,
            next_uid: AtomicU64::new(1),
            fail_writes: Mutex::new(None),
        }
    }

    /// Seeds an object without recording a mutation.
    pub fn insert(&self, mut object: K) {
        self.assign_uid(&mut object);
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        self.objects.lock().insert(key, object);
    }

    pub fn all(&self) -> Vec<K> {
        self.objects.lock().values().cloned().collect()
    }

    /// Makes every following write fail with the given HTTP status code.
    pub fn fail_writes(&self, code: u16) {
        *self.fail_writes.lock() = Some(code);
    }

    fn assign_uid(&self, object: &mut K) {
        if object.meta().uid.is_none() {
            let uid = self.next_uid.fetch_add(1, Ordering::Relaxed);
            object.meta_mut().uid = Some(format!("{}-{uid}", K::kind(&()).to_lowercase()));
        }
    }

    fn check_writable(&self) -> Result<()> {
        match *self.fail_writes.lock() {
            Some(code) => Err(api_error(code, "InternalError", "injected failure".into())),
            None => Ok(()),
        }
    }

    fn write(&self, verb: Verb, namespace: &str, object: &K) -> Result<K> {
        self.check_writable()?;
        let name = object.name_any();
        let key = (namespace.to_string(), name.clone());
        let mut objects = self.objects.lock();
        let version = match (verb, objects.get(&key)) {
            (Verb::Create, Some(_)) => {
                return Err(api_error(
                    409,
                    "AlreadyExists",
                    format!("{} {name:?} already exists", K::kind(&())),
                ))
            }
            (Verb::Create, None) => 1,
            (_, None) => {
                return Err(api_error(
                    404,
                    "NotFound",
                    format!("{} {name:?} not found", K::kind(&())),
                ))
            }
            (_, Some(existing)) => {
                existing
                    .meta()
                    .resource_version
                    .as_deref()
                    .and_then(|version| version.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1
            }
        };

        let mut stored = object.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        stored.meta_mut().resource_version = Some(version.to_string());
        if let Some(existing) = objects.get(&key) {
            stored.meta_mut().uid = existing.meta().uid.clone();
        }
        self.assign_uid(&mut stored);
        objects.insert(key, stored.clone());
        self.tracker.record(verb, &K::kind(&()), namespace, &name);
        Ok(stored)
    }
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::Kube(kube_client::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message,
        reason: reason.into(),
        code,
    }))
}

impl<K: Object> Objects<K> for MemoryObjects<K> {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.objects
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .map(Arc::new)
    }

    fn list(&self, namespace: &str, selector: &Selector) -> Vec<Arc<K>> {
        self.objects
            .lock()
            .iter()
            .filter(|((ns, _), object)| ns == namespace && selector.matches(object.labels()))
            .map(|(_, object)| Arc::new(object.clone()))
            .collect()
    }

    fn create<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>> {
        async move { self.write(Verb::Create, namespace, object) }.boxed()
    }

    fn replace<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>> {
        async move { self.write(Verb::Update, namespace, object) }.boxed()
    }

    fn replace_status<'a>(
        &'a self,
        namespace: &'a str,
        object: &'a K,
    ) -> BoxFuture<'a, Result<K>> {
        async move { self.write(Verb::UpdateStatus, namespace, object) }.boxed()
    }

    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            self.check_writable()?;
            self.objects
                .lock()
                .remove(&(namespace.to_string(), name.to_string()));
            self.tracker
                .record(Verb::Delete, &K::kind(&()), namespace, name);
            Ok(())
        }
        .boxed()
    }
}

impl<K: Object> HasSynced for MemoryObjects<K> {
    fn wait_synced(&self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }
}
