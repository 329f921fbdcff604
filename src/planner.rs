//! Chooses the single structural change to make next.
//!
//! Conditions are checked in a fixed order over the node pools in declared order,
//! and the first match wins:
//! a pool missing from the status is created,
//! then a pool with fewer ready replicas than desired is scaled out,
//! then a pool running an older version is upgraded.
//! New pools are therefore complete before anything is scaled or upgraded.

use std::{cmp::Ordering, fmt};

use kube_core::ResourceExt;
use semver::Version;
use thiserror::Error;

use crate::crd::{ManagedCluster, NodePool};

/// The next structural change for a cluster.
pub enum Action<'a, C> {
    CreateNodePool {
        cluster: &'a C,
        node_pool: &'a NodePool,
    },
    ScaleOut {
        cluster: &'a C,
        node_pool: &'a NodePool,
    },
    UpdateVersion {
        cluster: &'a C,
        node_pool: &'a NodePool,
    },
    None,
}

impl<'a, C> Action<'a, C> {
    /// The action name, also used as the reason of the event emitted on success.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateNodePool { .. } => "CreateNodePool",
            Action::ScaleOut { .. } => "ScaleOut",
            Action::UpdateVersion { .. } => "UpdateVersion",
            Action::None => "None",
        }
    }

    pub fn node_pool(&self) -> Option<&'a NodePool> {
        match *self {
            Action::CreateNodePool { node_pool, .. }
            | Action::ScaleOut { node_pool, .. }
            | Action::UpdateVersion { node_pool, .. } => Some(node_pool),
            Action::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Action::None)
    }
}

impl<C> fmt::Debug for Action<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_pool() {
            Some(node_pool) => write!(f, "{}({})", self.name(), node_pool.name),
            None => f.write_str(self.name()),
        }
    }
}

/// A desired change the controller refuses to make.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("unsupported scale-down of node pool {node_pool} from {ready} to {desired} replicas")]
    ScaleDown {
        node_pool: String,
        desired: i32,
        ready: i32,
    },

    #[error("unsupported downgrade of node pool {node_pool} from {observed} to {desired}")]
    Downgrade {
        node_pool: String,
        observed: Version,
        desired: Version,
    },

    #[error("unsupported major version upgrade of node pool {node_pool} from {observed} to {desired}")]
    MajorUpgrade {
        node_pool: String,
        observed: Version,
        desired: Version,
    },
}

/// Plans the next action from the cluster spec and its last recorded status.
///
/// Returns an error where the spec asks for a change that is never made implicitly.
pub fn plan<C: ManagedCluster>(cluster: &C) -> Result<Action<'_, C>, PlanError> {
    let node_pools = cluster.node_pools();

    if let Some(node_pool) = node_pools
        .iter()
        .find(|node_pool| cluster.node_pool_status(&node_pool.name).is_none())
    {
        return Ok(Action::CreateNodePool { cluster, node_pool });
    }

    for node_pool in node_pools {
        let Some(status) = cluster.node_pool_status(&node_pool.name) else {
            continue;
        };
        match node_pool.replicas.cmp(&status.ready_replicas) {
            Ordering::Greater => return Ok(Action::ScaleOut { cluster, node_pool }),
            Ordering::Less => {
                return Err(PlanError::ScaleDown {
                    node_pool: node_pool.name.clone(),
                    desired: node_pool.replicas,
                    ready: status.ready_replicas,
                })
            }
            Ordering::Equal => {}
        }
    }

    for node_pool in node_pools {
        // Wait until every pilot of the pool has reported a version.
        let Some(observed) = cluster
            .node_pool_status(&node_pool.name)
            .and_then(|status| status.version.as_ref())
        else {
            return Ok(Action::None);
        };
        let desired = cluster.node_pool_version(node_pool);

        if desired < observed {
            return Err(PlanError::Downgrade {
                node_pool: node_pool.name.clone(),
                observed: observed.clone(),
                desired: desired.clone(),
            });
        }
        if desired.major != observed.major {
            return Err(PlanError::MajorUpgrade {
                node_pool: node_pool.name.clone(),
                observed: observed.clone(),
                desired: desired.clone(),
            });
        }
        if observed < desired {
            return Ok(Action::UpdateVersion { cluster, node_pool });
        }
    }

    Ok(Action::None)
}

/// Like [`plan`], but logs a refused change and returns [`Action::None`] for it.
///
/// Nothing will converge until the spec is corrected, so retrying would not help.
pub fn next_action<C: ManagedCluster>(cluster: &C) -> Action<'_, C> {
    match plan(cluster) {
        Ok(action) => action,
        Err(err) => {
            log::error!(
                "Not acting on {} {}/{}: {err}",
                C::kind(&()),
                cluster.namespace().unwrap_or_default(),
                cluster.name_any()
            );
            Action::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{cassandra_cluster, with_status},
        CassandraCluster,
    };

    fn v(version: &str) -> Version {
        Version::parse(version).unwrap()
    }

    fn planned(cluster: &CassandraCluster) -> String {
        format!("{:?}", plan(cluster).unwrap())
    }

    #[test]
    fn creates_first_missing_pool_in_declared_order() {
        let cluster = with_status(
            cassandra_cluster("foo", "bar", &[("a", 3), ("b", 3), ("c", 3)]),
            &[("a", 1, None)],
        );
        assert_eq!(planned(&cluster), "CreateNodePool(b)");

        // Creation wins over any scale out or upgrade elsewhere.
        let cluster = with_status(
            cassandra_cluster("foo", "bar", &[("a", 5), ("b", 3)]),
            &[("a", 1, Some("3.0.0"))],
        );
        assert_eq!(planned(&cluster), "CreateNodePool(b)");
    }

    #[test]
    fn scales_out_first_pool_below_desired() {
        for (ready_a, ready_b, expected) in [
            (1, 3, "ScaleOut(a)"),
            (3, 1, "ScaleOut(b)"),
            (0, 0, "ScaleOut(a)"),
            (3, 3, "None"),
        ] {
            let cluster = with_status(
                cassandra_cluster("foo", "bar", &[("a", 3), ("b", 3)]),
                &[("a", ready_a, None), ("b", ready_b, None)],
            );
            assert_eq!(planned(&cluster), expected, "ready {ready_a}/{ready_b}");
        }
    }

    #[test]
    fn refuses_scale_down() {
        let cluster = with_status(
            cassandra_cluster("foo", "bar", &[("a", 2)]),
            &[("a", 3, Some("3.11.1"))],
        );
        assert_eq!(
            plan(&cluster).unwrap_err(),
            PlanError::ScaleDown {
                node_pool: "a".into(),
                desired: 2,
                ready: 3,
            }
        );
        assert!(next_action(&cluster).is_none());
    }

    #[test]
    fn scale_down_blocks_later_scale_out() {
        let cluster = with_status(
            cassandra_cluster("foo", "bar", &[("a", 1), ("b", 5)]),
            &[("a", 3, None), ("b", 1, None)],
        );
        assert!(matches!(plan(&cluster), Err(PlanError::ScaleDown { .. })));
    }

    #[test]
    fn waits_for_observed_version() {
        let mut cluster = cassandra_cluster("foo", "bar", &[("a", 3)]);
        cluster.spec.version = v("3.11.2");
        let cluster = with_status(cluster, &[("a", 3, None)]);
        assert_eq!(planned(&cluster), "None");
    }

    #[test]
    fn upgrades_within_major_version() {
        let mut cluster = cassandra_cluster("foo", "bar", &[("a", 3), ("b", 3)]);
        cluster.spec.version = v("3.11.2");
        let cluster = with_status(cluster, &[("a", 3, Some("3.11.2")), ("b", 3, Some("3.11.1"))]);
        assert_eq!(planned(&cluster), "UpdateVersion(b)");
    }

    #[test]
    fn pool_version_overrides_cluster_version() {
        let mut cluster = cassandra_cluster("foo", "bar", &[("a", 3)]);
        cluster.spec.version = v("3.11.1");
        cluster.spec.node_pools[0].version = Some(v("3.11.3"));
        let cluster = with_status(cluster, &[("a", 3, Some("3.11.1"))]);
        assert_eq!(planned(&cluster), "UpdateVersion(a)");
    }

    #[test]
    fn refuses_downgrade_and_major_upgrade() {
        let mut cluster = cassandra_cluster("foo", "bar", &[("a", 3)]);
        cluster.spec.version = v("3.11.0");
        let downgrade = with_status(cluster.clone(), &[("a", 3, Some("3.11.1"))]);
        assert!(matches!(plan(&downgrade), Err(PlanError::Downgrade { .. })));
        assert!(next_action(&downgrade).is_none());

        cluster.spec.version = v("4.0.0");
        let major = with_status(cluster, &[("a", 3, Some("3.11.1"))]);
        assert_eq!(
            plan(&major).unwrap_err().to_string(),
            "unsupported major version upgrade of node pool a from 3.11.1 to 4.0.0"
        );
        assert!(next_action(&major).is_none());
    }

    #[test]
    fn converged_cluster_needs_nothing() {
        let cluster = with_status(
            cassandra_cluster("foo", "bar", &[("a", 3), ("b", 1)]),
            &[("a", 3, Some("3.11.1")), ("b", 1, Some("3.11.1"))],
        );
        assert_eq!(planned(&cluster), "None");

        let empty = cassandra_cluster("foo", "bar", &[]);
        assert_eq!(planned(&empty), "None");
    }
}
