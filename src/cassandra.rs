//! The Cassandra cluster controller.

use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::core::v1::Service;

use crate::{
    control::ClusterControl,
    controllers::{
        nodepool::NodePoolControl,
        pilot::PilotControl,
        rbac,
        run_cluster_controller,
        seedlabeller::SeedLabeller,
        service::{self, service_port, ServiceTemplate},
        status::StatusControl,
        Clients, Context,
    },
    crd::CassandraCluster,
    events::Recorder,
    labels, naming, Result,
};

const INTRA_NODE_PORT: i32 = 7000;

/// The headless service that resolves to the seed pods only.
///
/// New nodes find the ring through it, so it must publish pods before they are ready.
fn seed_service(cluster: &CassandraCluster) -> Result<Service> {
    let mut selector = labels::cluster_labels(cluster);
    selector.insert(labels::CASSANDRA_SEED.to_string(), "true".to_string());
    service::render(
        cluster,
        ServiceTemplate {
            name: naming::seed_service_name(cluster),
            role: "seeds",
            ports: vec![service_port("intra-node", INTRA_NODE_PORT)],
            selector,
            headless: true,
        },
    )
}

/// The CQL service in front of every node of the cluster.
fn nodes_service(cluster: &CassandraCluster) -> Result<Service> {
    service::render(
        cluster,
        ServiceTemplate {
            name: naming::resource_base_name(cluster),
            role: "nodes",
            ports: vec![service_port("cql", cluster.spec.cql_port)],
            selector: labels::cluster_labels(cluster),
            headless: false,
        },
    )
}

pub fn control(
    clients: Clients<CassandraCluster>,
    recorder: Arc<dyn Recorder>,
) -> ClusterControl<CassandraCluster> {
    ClusterControl::new(clients.clone(), recorder)
        .step(service::control(clients.services.clone(), seed_service))
        .step(service::control(clients.services.clone(), nodes_service))
        .step(NodePoolControl::new(clients.statefulsets.clone()))
        .step(PilotControl::new(clients.pods.clone(), clients.pilots.clone()))
        .step(StatusControl::new(clients.statefulsets.clone(), clients.pilots.clone()))
        .step(rbac::service_account_control(clients.service_accounts.clone()))
        .step(rbac::role_control(clients.roles.clone()))
        .step(rbac::role_binding_control(clients.role_bindings.clone()))
        .step(SeedLabeller::new(clients.statefulsets, clients.pods))
}

/// Runs the Cassandra controller until the context is cancelled.
pub fn run(ctx: Context) -> BoxFuture<'static, Result<()>> {
    run_cluster_controller::<CassandraCluster>(ctx, control).boxed()
}
