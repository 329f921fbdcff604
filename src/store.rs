//! The boundary to the declarative resource API and its local watch cache.
//!
//! Reads go to an eventually consistent cache; writes go to the apiserver.
//! Controllers only ever see [`Objects`], so tests can swap in an in-memory store.

use std::{collections::BTreeMap, fmt, sync::Arc};

use futures::future::BoxFuture;
use k8s_openapi::NamespaceResourceScope;
use kube_core::Resource;
use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

/// Bounds shared by every namespaced kind handled by the controllers.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Read-through access to one kind of object.
pub trait Objects<K>: Send + Sync {
    /// Looks an object up in the local cache.
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>>;

    /// Lists cached objects in `namespace` whose labels match `selector`.
    fn list(&self, namespace: &str, selector: &Selector) -> Vec<Arc<K>>;

    fn create<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>>;

    fn replace<'a>(&'a self, namespace: &'a str, object: &'a K) -> BoxFuture<'a, Result<K>>;

    /// Writes the status subresource of `object`.
    fn replace_status<'a>(&'a self, namespace: &'a str, object: &'a K)
        -> BoxFuture<'a, Result<K>>;

    /// Deletes an object. Deleting an object that is already gone succeeds.
    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// A cache that can report whether its initial list has completed.
pub trait HasSynced: Send + Sync {
    fn wait_synced(&self) -> BoxFuture<'_, Result<()>>;
}

/// An equality-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Selector {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory;
