use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use schemars::JsonSchema;
use semver::Version;
use serde::{Deserialize, Serialize};

/// A named, homogeneous group of database nodes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    /// Unique within the cluster. Also the last segment of the pool's resource names.
    pub name: String,
    pub replicas: i32,
    /// Overrides the cluster version for this pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub version: Option<Version>,
    /// Each role becomes a `<role>=true` label on the pool's pods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Number of pods of this pool that act as seeds (Cassandra only, default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds: Option<i32>,
}

/// A fully qualified container image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub repository: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

impl ImageSpec {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// A container image repository. The tag is always the database version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRepository {
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

impl ImageRepository {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            pull_policy: None,
        }
    }

    pub fn reference(&self, version: &Version) -> String {
        format!("{}:{version}", self.repository)
    }
}

/// Observed state, rebuilt from child resources on every sync.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Keyed by node pool name. A missing entry means the pool has not been created.
    #[serde(default)]
    pub node_pools: BTreeMap<String, NodePoolStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolStatus {
    #[serde(default)]
    pub ready_replicas: i32,
    /// Lowest version reported by the pool's pilots, once all of them have reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub version: Option<Version>,
}
