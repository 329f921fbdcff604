//! Deterministic names of the resources derived from a cluster.

use kube_core::ResourceExt;

use crate::{crd::ManagedCluster, Error, Result};

/// `<prefix>-<cluster>`: the nodes or client service and the service account.
pub fn resource_base_name<C: ManagedCluster>(cluster: &C) -> String {
    format!("{}-{}", C::TYPE_PREFIX, cluster.name_any())
}

/// `<prefix>-<cluster>-<pool>`: the statefulset of one node pool.
pub fn node_pool_resource_name<C: ManagedCluster>(cluster: &C, pool: &str) -> String {
    format!("{}-{pool}", resource_base_name(cluster))
}

pub fn seed_service_name<C: ManagedCluster>(cluster: &C) -> String {
    format!("{}-seeds", resource_base_name(cluster))
}

pub fn discovery_service_name<C: ManagedCluster>(cluster: &C) -> String {
    format!("{}-discovery", resource_base_name(cluster))
}

/// The role and role binding that let the pilots of a cluster report status.
pub fn pilot_rbac_name<C: ManagedCluster>(cluster: &C) -> String {
    format!("{}-pilot", resource_base_name(cluster))
}

/// A pool-scoped resource name split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePoolResourceName<'a> {
    pub prefix: &'a str,
    pub cluster: &'a str,
    pub pool: &'a str,
}

/// Inverts [`node_pool_resource_name`].
///
/// Cluster names may contain dashes, so the pool is taken to be the last segment.
pub fn parse_node_pool_resource_name(name: &str) -> Result<NodePoolResourceName<'_>> {
    let invalid = || Error::InvalidResourceName(name.to_string());
    let (prefix, rest) = name.split_once('-').ok_or_else(invalid)?;
    let (cluster, pool) = rest.rsplit_once('-').ok_or_else(invalid)?;
    if prefix.is_empty() || cluster.is_empty() || pool.is_empty() {
        return Err(invalid());
    }
    Ok(NodePoolResourceName {
        prefix,
        cluster,
        pool,
    })
}
