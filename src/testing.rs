//! Fixtures shared by the unit tests.

use std::sync::Arc;

use k8s_openapi::api::{
    apps::v1::StatefulSet,
    core::v1::{Pod, Service, ServiceAccount},
    rbac::v1::{Role, RoleBinding},
};
use kube_core::{ObjectMeta, Resource, ResourceExt};

use crate::{
    controllers::Clients,
    crd::{
        CassandraCluster, CassandraClusterSpec, ClusterStatus, ElasticsearchCluster,
        ElasticsearchClusterSpec, ImageSpec, ManagedCluster, NodePool, NodePoolStatus, Pilot,
        PilotSpec,
    },
    labels,
    ownership::controller_ref,
    store::memory::{MemoryObjects, Tracker},
};

fn node_pools(pools: &[(&str, i32)]) -> Vec<NodePool> {
    pools
        .iter()
        .map(|(name, replicas)| NodePool {
            name: name.to_string(),
            replicas: *replicas,
            ..NodePool::default()
        })
        .collect()
}

fn cluster_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("{namespace}-{name}-uid")),
        ..ObjectMeta::default()
    }
}

fn pilot_image() -> ImageSpec {
    ImageSpec {
        repository: "quay.io/dbcluster/pilot".to_string(),
        tag: "v0.1.0".to_string(),
        pull_policy: None,
    }
}

/// A Cassandra 3.11.1 cluster without status.
pub(crate) fn cassandra_cluster(
    namespace: &str,
    name: &str,
    pools: &[(&str, i32)],
) -> CassandraCluster {
    let mut cluster = CassandraCluster::new(
        name,
        CassandraClusterSpec {
            node_pools: node_pools(pools),
            version: semver::Version::new(3, 11, 1),
            image: None,
            pilot_image: pilot_image(),
            sysctls: Vec::new(),
            cql_port: 9042,
        },
    );
    cluster.metadata = cluster_meta(namespace, name);
    cluster
}

/// An Elasticsearch 6.2.4 cluster without status.
pub(crate) fn elasticsearch_cluster(
    namespace: &str,
    name: &str,
    pools: &[(&str, i32)],
) -> ElasticsearchCluster {
    let mut cluster = ElasticsearchCluster::new(
        name,
        ElasticsearchClusterSpec {
            node_pools: node_pools(pools),
            version: semver::Version::new(6, 2, 4),
            image: None,
            pilot_image: pilot_image(),
            sysctls: Vec::new(),
            plugins: Vec::new(),
        },
    );
    cluster.metadata = cluster_meta(namespace, name);
    cluster
}

/// Replaces the status with `(pool, ready replicas, observed version)` entries.
pub(crate) fn with_status<C: ManagedCluster>(
    mut cluster: C,
    pools: &[(&str, i32, Option<&str>)],
) -> C {
    let node_pools = pools
        .iter()
        .map(|(name, ready_replicas, version)| {
            let status = NodePoolStatus {
                ready_replicas: *ready_replicas,
                version: version.map(|version| version.parse().unwrap()),
            };
            (name.to_string(), status)
        })
        .collect();
    cluster.set_cluster_status(ClusterStatus { node_pools });
    cluster
}

pub(crate) fn foreign_statefulset(namespace: &str, name: &str) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        ..StatefulSet::default()
    }
}

/// A pod of `pool` as the statefulset controller would label it.
pub(crate) fn pod<C: ManagedCluster>(cluster: &C, name: &str, pool: &str) -> Pod {
    let mut labels = labels::cluster_labels(cluster);
    labels.insert(labels::NODE_POOL_NAME.to_string(), pool.to_string());
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: cluster.namespace(),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        ..Pod::default()
    }
}

/// Makes `pod` controlled by `owner`.
pub(crate) fn pod_of(owner: &StatefulSet, mut pod: Pod) -> Pod {
    pod.metadata.owner_references = owner.controller_owner_ref(&()).map(|owner| vec![owner]);
    pod
}

/// A pilot owned by `cluster` for a pod of `pool`.
pub(crate) fn pilot<C: ManagedCluster>(cluster: &C, name: &str, pool: &str) -> Pilot {
    let mut labels = labels::cluster_labels(cluster);
    labels.insert(labels::NODE_POOL_NAME.to_string(), pool.to_string());
    Pilot {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: cluster.namespace(),
            labels: Some(labels),
            owner_references: Some(vec![controller_ref(cluster).unwrap()]),
            ..ObjectMeta::default()
        },
        spec: PilotSpec {},
        status: None,
    }
}

/// In-memory stores for every kind, recording into one tracker.
pub(crate) struct Fixture {
    pub tracker: Tracker,
    pub cassandra_clusters: Arc<MemoryObjects<CassandraCluster>>,
    pub elasticsearch_clusters: Arc<MemoryObjects<ElasticsearchCluster>>,
    pub services: Arc<MemoryObjects<Service>>,
    pub statefulsets: Arc<MemoryObjects<StatefulSet>>,
    pub pods: Arc<MemoryObjects<Pod>>,
    pub pilots: Arc<MemoryObjects<Pilot>>,
    pub service_accounts: Arc<MemoryObjects<ServiceAccount>>,
    pub roles: Arc<MemoryObjects<Role>>,
    pub role_bindings: Arc<MemoryObjects<RoleBinding>>,
    pub cassandra: Clients<CassandraCluster>,
    pub elasticsearch: Clients<ElasticsearchCluster>,
}

impl Fixture {
    pub fn new() -> Self {
        let tracker = Tracker::default();
        let cassandra_clusters = Arc::new(MemoryObjects::new(tracker.clone()));
        let elasticsearch_clusters = Arc::new(MemoryObjects::new(tracker.clone()));
        let services = Arc::new(MemoryObjects::new(tracker.clone()));
        let statefulsets = Arc::new(MemoryObjects::new(tracker.clone()));
        let pods = Arc::new(MemoryObjects::new(tracker.clone()));
        let pilots = Arc::new(MemoryObjects::new(tracker.clone()));
        let service_accounts = Arc::new(MemoryObjects::new(tracker.clone()));
        let roles = Arc::new(MemoryObjects::new(tracker.clone()));
        let role_bindings = Arc::new(MemoryObjects::new(tracker.clone()));

        let cassandra = Clients {
            clusters: cassandra_clusters.clone(),
            services: services.clone(),
            statefulsets: statefulsets.clone(),
            pods: pods.clone(),
            pilots: pilots.clone(),
            service_accounts: service_accounts.clone(),
            roles: roles.clone(),
            role_bindings: role_bindings.clone(),
        };
        let elasticsearch = Clients {
            clusters: elasticsearch_clusters.clone(),
            services: services.clone(),
            statefulsets: statefulsets.clone(),
            pods: pods.clone(),
            pilots: pilots.clone(),
            service_accounts: service_accounts.clone(),
            roles: roles.clone(),
            role_bindings: role_bindings.clone(),
        };

        Self {
            tracker,
            cassandra_clusters,
            elasticsearch_clusters,
            services,
            statefulsets,
            pods,
            pilots,
            service_accounts,
            roles,
            role_bindings,
            cassandra,
            elasticsearch,
        }
    }

    /// Stores `cluster` and returns it as stored.
    pub fn add_cassandra(&self, cluster: CassandraCluster) -> CassandraCluster {
        let key = (cluster.namespace().unwrap_or_default(), cluster.name_any());
        self.cassandra_clusters.insert(cluster);
        self.stored(&self.cassandra_clusters, key)
    }

    pub fn add_elasticsearch(&self, cluster: ElasticsearchCluster) -> ElasticsearchCluster {
        let key = (cluster.namespace().unwrap_or_default(), cluster.name_any());
        self.elasticsearch_clusters.insert(cluster);
        self.stored(&self.elasticsearch_clusters, key)
    }

    fn stored<K: crate::store::Object>(
        &self,
        objects: &MemoryObjects<K>,
        (namespace, name): (String, String),
    ) -> K {
        use crate::store::Objects;
        (*objects.get(&namespace, &name).unwrap()).clone()
    }
}
