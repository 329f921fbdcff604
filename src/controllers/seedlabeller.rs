//! Marks the first pods of every Cassandra node pool as seeds.
//!
//! The seed service selects pods by this label, and new nodes bootstrap
//! from whatever it resolves to.

use std::{marker::PhantomData, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::{apps::v1::StatefulSet, core::v1::Pod};
use kube_core::ResourceExt;

use crate::{
    control::{SubController, MESSAGE_ERROR_SYNC_SEED_LABELS},
    crd::ManagedCluster,
    labels::{self, CASSANDRA_SEED},
    naming,
    ownership::is_controlled_by,
    store::Objects,
    Result,
};

const DEFAULT_SEEDS: i32 = 1;

/// The ordinal a statefulset controller gave `pod`, parsed from its name.
fn ordinal(statefulset: &StatefulSet, pod: &Pod) -> Option<i32> {
    pod.name_any()
        .strip_prefix(&statefulset.name_any())?
        .strip_prefix('-')?
        .parse()
        .ok()
}

pub struct SeedLabeller<C> {
    statefulsets: Arc<dyn Objects<StatefulSet>>,
    pods: Arc<dyn Objects<Pod>>,
    _ph: PhantomData<fn(&C)>,
}

impl<C: ManagedCluster> SeedLabeller<C> {
    pub fn new(statefulsets: Arc<dyn Objects<StatefulSet>>, pods: Arc<dyn Objects<Pod>>) -> Self {
        Self {
            statefulsets,
            pods,
            _ph: PhantomData,
        }
    }

    async fn sync_seed_labels(&self, cluster: &C) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();

        for node_pool in cluster.node_pools() {
            let name = naming::node_pool_resource_name(cluster, &node_pool.name);
            let Some(statefulset) = self.statefulsets.get(&namespace, &name) else {
                continue;
            };
            if !is_controlled_by(&*statefulset, cluster) {
                continue;
            }
            let seeds = node_pool.seeds.unwrap_or(DEFAULT_SEEDS);

            let selector = labels::node_pool_selector(cluster, &node_pool.name);
            for pod in self.pods.list(&namespace, &selector) {
                if !is_controlled_by(&*pod, &*statefulset) {
                    continue;
                }
                let Some(ordinal) = ordinal(&statefulset, &pod) else {
                    continue;
                };
                let is_seed = pod.labels().get(CASSANDRA_SEED).map(String::as_str) == Some("true");
                let should_be_seed = ordinal < seeds;
                if is_seed == should_be_seed {
                    continue;
                }

                let mut updated = (*pod).clone();
                if should_be_seed {
                    updated
                        .labels_mut()
                        .insert(CASSANDRA_SEED.to_string(), "true".to_string());
                } else {
                    updated.labels_mut().remove(CASSANDRA_SEED);
                }
                log::debug!(
                    "Setting seed label of pod {namespace}/{} to {should_be_seed}",
                    pod.name_any()
                );
                self.pods.replace(&namespace, &updated).await?;
            }
        }
        Ok(())
    }
}

impl<C: ManagedCluster> SubController<C> for SeedLabeller<C> {
    fn message(&self) -> &'static str {
        MESSAGE_ERROR_SYNC_SEED_LABELS
    }

    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>> {
        self.sync_seed_labels(cluster).boxed()
    }
}
