//! kube-dbcluster reconciles clustered databases running on Kubernetes.
//!
//! Each managed kind (e.g. [`CassandraCluster`]) gets its own controller:
//! watch events enqueue the key of the affected cluster, and a pool of
//! workers syncs every queued cluster through an ordered pipeline of
//! sub-controllers (services, statefulsets, pilots, status, RBAC).
//! After the pipeline, at most one planned action is executed per sync,
//! e.g. creating a missing node pool or scaling one out.
//!
//! Every sync is level-triggered: it compares the declared spec against
//! the cached state of the derived resources, so it can be repeated safely.

pub mod actions;
pub mod cassandra;
pub mod config;
pub use config::{Config, RateLimiterConfig};
pub mod control;
pub mod controller;
pub mod controllers;
pub use controllers::Registry;
pub mod crd;
pub use crd::{CassandraCluster, ElasticsearchCluster, Pilot};
pub mod elasticsearch;
mod error;
pub use error::{Error, Result};
pub mod events;
pub mod hash;
pub mod labels;
pub mod naming;
pub mod ownership;
pub mod planner;
pub mod queue;
mod runner;
pub use runner::{default_registry, run, RunError};
pub mod store;
pub mod subscriber;

#[cfg(test)]
mod testing;
