use k8s_openapi::api::core::v1::{ContainerPort, EnvVar};
use kube::CustomResource;
use kube_core::ResourceExt;
use schemars::JsonSchema;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::naming;

use super::{
    container_port, env_var, ClusterStatus, ImageRepository, ImageSpec, ManagedCluster, NodePool,
};

#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dbcluster.io",
    version = "v1alpha1",
    kind = "CassandraCluster",
    plural = "cassandraclusters",
    shortname = "cass",
    namespaced,
    status = "ClusterStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CassandraClusterSpec {
    pub node_pools: Vec<NodePool>,
    #[schemars(with = "String")]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRepository>,
    /// Image that provides the pilot agent wrapping each database process.
    pub pilot_image: ImageSpec,
    /// Kernel parameters applied by a privileged init container, e.g. `vm.max_map_count=262144`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysctls: Vec<String>,
    #[serde(default = "default_cql_port")]
    pub cql_port: i32,
}

fn default_cql_port() -> i32 {
    9042
}

impl ManagedCluster for CassandraCluster {
    const TYPE_PREFIX: &'static str = "cass";
    const DEFAULT_IMAGE_REPOSITORY: &'static str = "cassandra";

    fn node_pools(&self) -> &[NodePool] {
        &self.spec.node_pools
    }

    fn version(&self) -> &Version {
        &self.spec.version
    }

    fn image(&self) -> Option<&ImageRepository> {
        self.spec.image.as_ref()
    }

    fn pilot_image(&self) -> &ImageSpec {
        &self.spec.pilot_image
    }

    fn sysctls(&self) -> &[String] {
        &self.spec.sysctls
    }

    fn container_ports(&self) -> Vec<ContainerPort> {
        vec![
            container_port("intra-node", 7000),
            container_port("jmx", 7199),
            container_port("cql", self.spec.cql_port),
        ]
    }

    fn container_env(&self, _node_pool: &NodePool) -> Vec<EnvVar> {
        vec![
            env_var("CASSANDRA_CLUSTER_NAME", self.name_any()),
            env_var("CASSANDRA_SEEDS", naming::seed_service_name(self)),
            env_var("CASSANDRA_ENDPOINT_SNITCH", "GossipingPropertyFileSnitch"),
        ]
    }

    fn cluster_status(&self) -> Option<&ClusterStatus> {
        self.status.as_ref()
    }

    fn set_cluster_status(&mut self, status: ClusterStatus) {
        self.status = Some(status);
    }
}
