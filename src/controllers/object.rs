//! The create/verify/update/collect cycle shared by singleton derived objects.

use std::{collections::BTreeMap, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use kube_core::{ObjectMeta, Resource, ResourceExt};

use crate::{
    control::SubController,
    crd::ManagedCluster,
    ownership::{controller_ref, owner_check},
    store::{Object, Objects, Selector},
    Result,
};

/// An object kind whose controller-managed fields can be copied onto a live object.
pub trait Managed: Object {
    /// Copies the managed fields of `desired` onto `self`,
    /// keeping fields assigned by the server.
    ///
    /// Returns whether `self` changed.
    fn merge_from(&mut self, desired: &Self) -> bool;
}

/// Renders the desired object for a cluster.
pub type Render<C, K> = fn(&C) -> Result<K>;

/// Metadata of an object derived from `cluster`, controlled by it.
pub fn metadata<C: ManagedCluster>(
    cluster: &C,
    name: String,
    labels: BTreeMap<String, String>,
) -> Result<ObjectMeta> {
    Ok(ObjectMeta {
        name: Some(name),
        namespace: cluster.namespace(),
        labels: Some(labels),
        owner_references: Some(vec![controller_ref(cluster)?]),
        ..ObjectMeta::default()
    })
}

/// Sets every desired label and annotation on `existing`. Others are left alone.
pub fn merge_metadata<K: Resource>(existing: &mut K, desired: &K) -> bool {
    let mut changed = false;
    if !desired.labels().is_empty() {
        changed |= merge_map(existing.labels_mut(), desired.labels());
    }
    if !desired.annotations().is_empty() {
        changed |= merge_map(existing.annotations_mut(), desired.annotations());
    }
    changed
}

fn merge_map(
    existing: &mut BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> bool {
    let mut changed = false;
    for (key, value) in desired {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Overwrites `existing` with `desired` if they differ.
pub fn merge_field<T: PartialEq + Clone>(existing: &mut T, desired: &T) -> bool {
    if existing == desired {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Keeps exactly one object of kind `K`, rendered from the cluster, in place.
///
/// Objects matching the rendered object's labels under any other name are deleted.
pub struct ObjectControl<C, K> {
    objects: Arc<dyn Objects<K>>,
    render: Render<C, K>,
    message: &'static str,
}

impl<C: ManagedCluster, K: Managed> ObjectControl<C, K> {
    pub fn new(
        objects: Arc<dyn Objects<K>>,
        render: Render<C, K>,
        message: &'static str,
    ) -> Self {
        Self {
            objects,
            render,
            message,
        }
    }

    async fn sync_object(&self, cluster: &C) -> Result<()> {
        let desired = (self.render)(cluster)?;
        let namespace = cluster.namespace().unwrap_or_default();
        let name = desired.name_any();

        match self.objects.get(&namespace, &name) {
            None => {
                log::debug!("Creating {} {namespace}/{name}", K::kind(&()));
                self.objects.create(&namespace, &desired).await?;
            }
            Some(existing) => {
                owner_check(&*existing, cluster)?;
                let mut updated = (*existing).clone();
                if updated.merge_from(&desired) {
                    log::debug!("Updating {} {namespace}/{name}", K::kind(&()));
                    self.objects.replace(&namespace, &updated).await?;
                }
            }
        }

        let selector = Selector::from(desired.labels().clone());
        for orphan in self.objects.list(&namespace, &selector) {
            let orphan_name = orphan.name_any();
            if orphan_name == name {
                continue;
            }
            owner_check(&*orphan, cluster)?;
            log::info!("Deleting {} {namespace}/{orphan_name}", K::kind(&()));
            self.objects.delete(&namespace, &orphan_name).await?;
        }
        Ok(())
    }
}

impl<C: ManagedCluster, K: Managed> SubController<C> for ObjectControl<C, K> {
    fn message(&self) -> &'static str {
        self.message
    }

    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>> {
        self.sync_object(cluster).boxed()
    }
}
