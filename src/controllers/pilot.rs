//! One [`Pilot`] per database pod, named after the pod.
//!
//! The agent in each pod reports through its pilot,
//! so a pilot outliving its pod is deleted.

use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::core::v1::Pod;
use kube_core::ResourceExt;

use super::object::{merge_metadata, metadata};
use crate::{
    control::{SubController, MESSAGE_ERROR_SYNC_PILOTS},
    crd::{ManagedCluster, Pilot, PilotSpec},
    labels,
    ownership::owner_check,
    store::Objects,
    Result,
};

/// Labels a pod's pilot should carry: the cluster labels and the pod's node pool.
fn pilot_labels<C: ManagedCluster>(cluster: &C, pod: &Pod) -> BTreeMap<String, String> {
    let mut pilot_labels = labels::cluster_labels(cluster);
    if let Some(node_pool) = pod.labels().get(labels::NODE_POOL_NAME) {
        pilot_labels.insert(labels::NODE_POOL_NAME.to_string(), node_pool.clone());
    }
    pilot_labels
}

pub fn pilot_for_pod<C: ManagedCluster>(cluster: &C, pod: &Pod) -> Result<Pilot> {
    Ok(Pilot {
        metadata: metadata(cluster, pod.name_any(), pilot_labels(cluster, pod))?,
        spec: PilotSpec {},
        status: None,
    })
}

pub struct PilotControl<C> {
    pods: Arc<dyn Objects<Pod>>,
    pilots: Arc<dyn Objects<Pilot>>,
    _ph: PhantomData<fn(&C)>,
}

impl<C: ManagedCluster> PilotControl<C> {
    pub fn new(pods: Arc<dyn Objects<Pod>>, pilots: Arc<dyn Objects<Pilot>>) -> Self {
        Self {
            pods,
            pilots,
            _ph: PhantomData,
        }
    }

    async fn sync_pod(&self, cluster: &C, namespace: &str, pod: &Pod) -> Result<()> {
        let desired = pilot_for_pod(cluster, pod)?;
        let Some(existing) = self.pilots.get(namespace, &pod.name_any()) else {
            log::debug!("Creating pilot {namespace}/{}", pod.name_any());
            self.pilots.create(namespace, &desired).await?;
            return Ok(());
        };

        owner_check(&*existing, cluster)?;
        let mut updated = (*existing).clone();
        if merge_metadata(&mut updated, &desired) {
            log::debug!("Updating labels of pilot {namespace}/{}", pod.name_any());
            self.pilots.replace(namespace, &updated).await?;
        }
        Ok(())
    }

    async fn sync_pilots(&self, cluster: &C) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();
        let selector = labels::cluster_selector(cluster);

        let pods = self.pods.list(&namespace, &selector);
        for pod in &pods {
            self.sync_pod(cluster, &namespace, pod).await?;
        }

        for pilot in self.pilots.list(&namespace, &selector) {
            let name = pilot.name_any();
            if pods.iter().any(|pod| pod.name_any() == name) {
                continue;
            }
            owner_check(&*pilot, cluster)?;
            log::info!("Deleting pilot {namespace}/{name} without a pod");
            self.pilots.delete(&namespace, &name).await?;
        }
        Ok(())
    }
}

impl<C: ManagedCluster> SubController<C> for PilotControl<C> {
    fn message(&self) -> &'static str {
        MESSAGE_ERROR_SYNC_PILOTS
    }

    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>> {
        self.sync_pilots(cluster).boxed()
    }
}
