//! Owner references from derived resources back to their cluster.
//!
//! A resource that exists under an expected name but is controlled by
//! anything other than the cluster is never adopted or overwritten.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube_core::{Resource, ResourceExt};

use crate::{crd::ManagedCluster, Error, Result};

/// The controller owner reference to set on resources derived from `cluster`.
pub fn controller_ref<C: ManagedCluster>(cluster: &C) -> Result<OwnerReference> {
    cluster
        .controller_owner_ref(&())
        .ok_or_else(|| Error::MissingMetadata {
            kind: C::kind(&()).into_owned(),
            field: "uid",
        })
}

/// The controlling owner reference of `object`, if any.
pub fn controller_of<K: Resource>(object: &K) -> Option<&OwnerReference> {
    object
        .meta()
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|owner| owner.controller == Some(true))
}

/// Whether `object` is controlled by `owner`, compared by uid.
pub fn is_controlled_by<K: Resource, O: Resource>(object: &K, owner: &O) -> bool {
    match (controller_of(object), owner.uid()) {
        (Some(reference), Some(uid)) => reference.uid == uid,
        _ => false,
    }
}

/// Fails with [`Error::ForeignOwned`] unless `object` is controlled by `cluster`.
pub fn owner_check<K: Resource, C: ManagedCluster>(object: &K, cluster: &C) -> Result<()> {
    if is_controlled_by(object, cluster) {
        return Ok(());
    }
    let owner = controller_of(object)
        .map(|reference| format!("{}/{}", reference.kind, reference.name))
        .unwrap_or_else(|| "<none>".to_string());
    Err(Error::ForeignOwned {
        namespace: object.namespace().unwrap_or_default(),
        name: object.name_any(),
        owner,
        cluster: cluster.name_any(),
    })
}
