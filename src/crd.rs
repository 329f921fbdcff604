//! Custom resources managed by the controllers.

use k8s_openapi::api::core::v1::{ContainerPort, EnvVar};
use semver::Version;

use crate::store::Object;

/// API group of every custom resource in this crate.
pub const GROUP: &str = "dbcluster.io";

mod cluster;
pub use cluster::{ClusterStatus, ImageRepository, ImageSpec, NodePool, NodePoolStatus};

mod cassandra;
pub use cassandra::{CassandraCluster, CassandraClusterSpec};

mod elasticsearch;
pub use elasticsearch::{ElasticsearchCluster, ElasticsearchClusterSpec};

mod pilot;
pub use pilot::{Pilot, PilotSpec, PilotStatus};

/// A clustered database kind the generic reconciliation core can drive.
pub trait ManagedCluster: Object {
    /// Short prefix of every derived resource name, e.g. `cass`.
    const TYPE_PREFIX: &'static str;

    /// Image repository used when the spec does not name one.
    const DEFAULT_IMAGE_REPOSITORY: &'static str;

    /// Node pools in declared order.
    fn node_pools(&self) -> &[NodePool];

    /// Cluster-wide database version.
    fn version(&self) -> &Version;

    fn image(&self) -> Option<&ImageRepository>;

    fn pilot_image(&self) -> &ImageSpec;

    fn sysctls(&self) -> &[String];

    fn plugins(&self) -> &[String] {
        &[]
    }

    /// Ports exposed by the database container.
    fn container_ports(&self) -> Vec<ContainerPort>;

    /// Kind specific environment of the database container of `node_pool`.
    fn container_env(&self, _node_pool: &NodePool) -> Vec<EnvVar> {
        Vec::new()
    }

    fn cluster_status(&self) -> Option<&ClusterStatus>;

    fn set_cluster_status(&mut self, status: ClusterStatus);

    fn image_repository(&self) -> ImageRepository {
        self.image()
            .cloned()
            .unwrap_or_else(|| ImageRepository::new(Self::DEFAULT_IMAGE_REPOSITORY))
    }

    /// The version a node pool should run: its own override, else the cluster version.
    fn node_pool_version<'a>(&'a self, node_pool: &'a NodePool) -> &'a Version {
        node_pool.version.as_ref().unwrap_or_else(|| self.version())
    }

    fn node_pool_status(&self, name: &str) -> Option<&NodePoolStatus> {
        self.cluster_status()
            .and_then(|status| status.node_pools.get(name))
    }
}

pub(crate) fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

pub(crate) fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..ContainerPort::default()
    }
}
