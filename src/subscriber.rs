//! Subscriptions to the apiserver that feed the work queue.
//!
//! Watch events are only used to learn *which* object changed.
//! Workers always re-read the object from the local cache before acting on it.

use std::{fmt, str::FromStr};

use kube_core::{Resource, ResourceExt};

use crate::Error;

/// Uniquely identifies an object of a known type by namespace and name.
///
/// This is the only payload carried by the work queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    /// The object namespace, if any
    pub namespace: Option<String>,
    /// The object name
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn from_resource<K: Resource>(resource: &K) -> Self {
        Self {
            namespace: resource.namespace(),
            name: resource.name_any(),
        }
    }

    /// The namespace, or the empty string for cluster-scoped objects.
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for QualifiedName {
    type Err = Error;

    /// Parses `namespace/name` or `name`.
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) if !name.is_empty() => Ok(Self {
                namespace: None,
                name: name.to_string(),
            }),
            (Some(namespace), Some(name), None) if !name.is_empty() => Ok(Self {
                namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
                name: name.to_string(),
            }),
            _ => Err(Error::InvalidKey(key.to_string())),
        }
    }
}

pub mod objects;
pub use objects::KubeObjects;
