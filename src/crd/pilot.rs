use kube::CustomResource;
use schemars::JsonSchema;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Registration of the agent running next to one database pod.
///
/// Created by the cluster controller, one per pod and with the pod's name.
/// The status is written by the agent itself.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dbcluster.io",
    version = "v1alpha1",
    kind = "Pilot",
    plural = "pilots",
    namespaced,
    status = "PilotStatus",
    derive = "PartialEq",
    derive = "Default"
)]
pub struct PilotSpec {}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PilotStatus {
    /// Version of the database process the agent is supervising.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub version: Option<Version>,
}
