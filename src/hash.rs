//! Drift detection for node pool statefulsets.

use k8s_openapi::api::core::v1::{ContainerPort, EnvVar, ResourceRequirements};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    crd::{ImageRepository, ImageSpec, ManagedCluster, NodePool},
    Result,
};

/// Annotation holding the hash of the inputs a statefulset was rendered from.
pub const NODE_POOL_HASH_ANNOTATION: &str = "dbcluster.io/node-pool-hash";

const HASH_LEN: usize = 16;

/// The behaviour-affecting inputs of one node pool.
///
/// Replicas and version are left out: they are changed by actions, not by drift.
#[derive(Serialize)]
struct HashInput<'a> {
    image: ImageRepository,
    pilot_image: &'a ImageSpec,
    plugins: &'a [String],
    sysctls: &'a [String],
    ports: Vec<ContainerPort>,
    env: Vec<EnvVar>,
    node_pool: PoolTemplate<'a>,
}

#[derive(Serialize)]
struct PoolTemplate<'a> {
    name: &'a str,
    roles: &'a [String],
    resources: Option<&'a ResourceRequirements>,
    seeds: Option<i32>,
}

/// Hashes everything that should cause a node pool to be re-rendered.
///
/// `collision_count` disambiguates otherwise equal hashes and is mixed in
/// as little-endian bytes after the serialized input.
pub fn compute_node_pool_hash<C: ManagedCluster>(
    cluster: &C,
    node_pool: &NodePool,
    collision_count: Option<i32>,
) -> Result<String> {
    let input = HashInput {
        image: cluster.image_repository(),
        pilot_image: cluster.pilot_image(),
        plugins: cluster.plugins(),
        sysctls: cluster.sysctls(),
        ports: cluster.container_ports(),
        env: cluster.container_env(node_pool),
        node_pool: PoolTemplate {
            name: &node_pool.name,
            roles: &node_pool.roles,
            resources: node_pool.resources.as_ref(),
            seeds: node_pool.seeds,
        },
    };

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&input)?);
    if let Some(count) = collision_count {
        hasher.update(count.to_le_bytes());
    }
    let mut hash = hex::encode(hasher.finalize());
    hash.truncate(HASH_LEN);
    Ok(hash)
}
