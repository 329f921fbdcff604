//! Recomputes the cluster status from its statefulsets and pilots.
//!
//! The status is rebuilt wholesale on every sync, never merged into the stale one.

use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use kube_core::ResourceExt;
use semver::Version;

use crate::{
    control::{SubController, MESSAGE_ERROR_SYNC_STATUS},
    crd::{ClusterStatus, ManagedCluster, NodePoolStatus, Pilot},
    labels,
    ownership::is_controlled_by,
    store::Objects,
    Result,
};

pub struct StatusControl<C> {
    statefulsets: Arc<dyn Objects<StatefulSet>>,
    pilots: Arc<dyn Objects<Pilot>>,
    _ph: PhantomData<fn(&C)>,
}

impl<C: ManagedCluster> StatusControl<C> {
    pub fn new(
        statefulsets: Arc<dyn Objects<StatefulSet>>,
        pilots: Arc<dyn Objects<Pilot>>,
    ) -> Self {
        Self {
            statefulsets,
            pilots,
            _ph: PhantomData,
        }
    }

    /// The lowest version reported by the pool's pilots.
    ///
    /// `None` until every pilot of the pool has reported one.
    fn observed_version(&self, cluster: &C, namespace: &str, node_pool: &str) -> Option<Version> {
        let pilots: Vec<_> = self
            .pilots
            .list(namespace, &labels::node_pool_selector(cluster, node_pool))
            .into_iter()
            .filter(|pilot| is_controlled_by(&**pilot, cluster))
            .collect();
        pilots
            .iter()
            .map(|pilot| pilot.status.as_ref()?.version.clone())
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .min()
    }

    fn status(&self, cluster: &C) -> ClusterStatus {
        let namespace = cluster.namespace().unwrap_or_default();
        let mut node_pools = BTreeMap::new();

        for statefulset in self
            .statefulsets
            .list(&namespace, &labels::cluster_selector(cluster))
        {
            if !is_controlled_by(&*statefulset, cluster) {
                log::debug!(
                    "Skipping statefulset {namespace}/{} not controlled by the cluster",
                    statefulset.name_any()
                );
                continue;
            }
            let Some(node_pool) = statefulset.labels().get(labels::NODE_POOL_NAME) else {
                continue;
            };
            let ready_replicas = statefulset
                .status
                .as_ref()
                .and_then(|status| status.ready_replicas)
                .unwrap_or_default();
            node_pools.insert(
                node_pool.clone(),
                NodePoolStatus {
                    ready_replicas,
                    version: self.observed_version(cluster, &namespace, node_pool),
                },
            );
        }
        ClusterStatus { node_pools }
    }
}

impl<C: ManagedCluster> SubController<C> for StatusControl<C> {
    fn message(&self) -> &'static str {
        MESSAGE_ERROR_SYNC_STATUS
    }

    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>> {
        async move {
            let status = self.status(cluster);
            cluster.set_cluster_status(status);
            Ok(())
        }
        .boxed()
    }
}
