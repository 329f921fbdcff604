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
    kind = "ElasticsearchCluster",
    plural = "elasticsearchclusters",
    shortname = "es",
    namespaced,
    status = "ClusterStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchClusterSpec {
    pub node_pools: Vec<NodePool>,
    #[schemars(with = "String")]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRepository>,
    pub pilot_image: ImageSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysctls: Vec<String>,
    /// Plugins installed into every node before it starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
}

impl ManagedCluster for ElasticsearchCluster {
    const TYPE_PREFIX: &'static str = "es";
    const DEFAULT_IMAGE_REPOSITORY: &'static str =
        "docker.elastic.co/elasticsearch/elasticsearch";

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

    fn plugins(&self) -> &[String] {
        &self.spec.plugins
    }

    fn container_ports(&self) -> Vec<ContainerPort> {
        vec![container_port("http", 9200), container_port("transport", 9300)]
    }

    fn container_env(&self, node_pool: &NodePool) -> Vec<EnvVar> {
        let has_role = |role: &str| node_pool.roles.iter().any(|r| r == role).to_string();
        let mut env = vec![
            env_var("cluster.name", self.name_any()),
            env_var(
                "discovery.zen.ping.unicast.hosts",
                naming::discovery_service_name(self),
            ),
            env_var("node.master", has_role("master")),
            env_var("node.data", has_role("data")),
            env_var("node.ingest", has_role("ingest")),
        ];
        if !self.spec.plugins.is_empty() {
            env.push(env_var("PLUGINS", self.spec.plugins.join(",")));
        }
        env
    }

    fn cluster_status(&self) -> Option<&ClusterStatus> {
        self.status.as_ref()
    }

    fn set_cluster_status(&mut self, status: ClusterStatus) {
        self.status = Some(status);
    }
}
