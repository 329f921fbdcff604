//! Labels carried by derived resources.
//!
//! The cluster never records its children.
//! They are found again by selecting on these labels.

use std::collections::BTreeMap;

use kube_core::{Resource, ResourceExt};

use crate::{
    crd::{ManagedCluster, NodePool},
    store::Selector,
    subscriber::QualifiedName,
};

/// Kind of the cluster a resource belongs to, e.g. `CassandraCluster`.
pub const CLUSTER_TYPE: &str = "dbcluster.io/cluster-type";
pub const CLUSTER_NAME: &str = "dbcluster.io/cluster-name";
pub const NODE_POOL_NAME: &str = "dbcluster.io/node-pool-name";
/// Tells the services of one cluster apart.
pub const SERVICE_ROLE: &str = "dbcluster.io/service-role";
/// Set to `true` on Cassandra pods that other nodes bootstrap from.
pub const CASSANDRA_SEED: &str = "dbcluster.io/cassandra-seed";

pub fn cluster_labels<C: ManagedCluster>(cluster: &C) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_TYPE.to_string(), C::kind(&()).into_owned()),
        (CLUSTER_NAME.to_string(), cluster.name_any()),
    ])
}

/// Labels identifying one node pool. These never change for the lifetime of the pool,
/// so they make up the immutable statefulset selector.
pub fn node_pool_selector_labels<C: ManagedCluster>(
    cluster: &C,
    pool: &str,
) -> BTreeMap<String, String> {
    let mut labels = cluster_labels(cluster);
    labels.insert(NODE_POOL_NAME.to_string(), pool.to_string());
    labels
}

/// Labels of a node pool's statefulset and pods. Each role is added as `<role>=true`.
pub fn node_pool_labels<C: ManagedCluster>(
    cluster: &C,
    node_pool: &NodePool,
) -> BTreeMap<String, String> {
    let mut labels = node_pool_selector_labels(cluster, &node_pool.name);
    for role in &node_pool.roles {
        labels.insert(role.clone(), "true".to_string());
    }
    labels
}

pub fn service_labels<C: ManagedCluster>(cluster: &C, role: &str) -> BTreeMap<String, String> {
    let mut labels = cluster_labels(cluster);
    labels.insert(SERVICE_ROLE.to_string(), role.to_string());
    labels
}

/// Selects every resource of one cluster.
pub fn cluster_selector<C: ManagedCluster>(cluster: &C) -> Selector {
    Selector::from(cluster_labels(cluster))
}

/// Selects the pods and pilots of one node pool.
pub fn node_pool_selector<C: ManagedCluster>(cluster: &C, pool: &str) -> Selector {
    Selector::from(node_pool_selector_labels(cluster, pool))
}

/// The key of the `C` cluster that `child` was derived from, read from its labels.
///
/// Returns `None` for objects of another cluster kind or without cluster labels.
pub fn owning_cluster<C: ManagedCluster, K: Resource>(child: &K) -> Option<QualifiedName> {
    let labels = child.labels();
    if labels.get(CLUSTER_TYPE).map(String::as_str) != Some(C::kind(&()).as_ref()) {
        return None;
    }
    let name = labels.get(CLUSTER_NAME)?;
    Some(QualifiedName {
        namespace: child.namespace(),
        name: name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Pod;
    use kube_core::ObjectMeta;

    use super::*;
    use crate::{crd::ElasticsearchCluster, testing::cassandra_cluster, CassandraCluster};

    #[test]
    fn pool_labels_include_roles() {
        let mut cluster = cassandra_cluster("foo", "bar", &[("ringnodes", 3)]);
        cluster.spec.node_pools[0].roles = vec!["data".into()];
        let labels = node_pool_labels(&cluster, &cluster.spec.node_pools[0]);
        assert_eq!(labels[CLUSTER_TYPE], "CassandraCluster");
        assert_eq!(labels[CLUSTER_NAME], "bar");
        assert_eq!(labels[NODE_POOL_NAME], "ringnodes");
        assert_eq!(labels["data"], "true");
        assert!(node_pool_selector(&cluster, "ringnodes").matches(&labels));
        assert!(!node_pool_selector(&cluster, "other").matches(&labels));
    }

    #[test]
    fn children_map_back_to_their_cluster() {
        let cluster = cassandra_cluster("foo", "bar", &[]);
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("cass-bar-ringnodes-0".into()),
                namespace: Some("foo".into()),
                labels: Some(cluster_labels(&cluster)),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        };
        assert_eq!(
            owning_cluster::<CassandraCluster, _>(&pod),
            Some(QualifiedName::new("foo", "bar"))
        );
        assert_eq!(owning_cluster::<ElasticsearchCluster, _>(&pod), None);
        assert_eq!(owning_cluster::<CassandraCluster, _>(&Pod::default()), None);
    }
}
