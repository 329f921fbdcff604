//! The Elasticsearch cluster controller.

use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::core::v1::Service;

use crate::{
    control::ClusterControl,
    controllers::{
        nodepool::NodePoolControl,
        pilot::PilotControl,
        rbac, run_cluster_controller,
        service::{self, service_port, ServiceTemplate},
        status::StatusControl,
        Clients, Context,
    },
    crd::ElasticsearchCluster,
    events::Recorder,
    labels, naming, Result,
};

const HTTP_PORT: i32 = 9200;
const TRANSPORT_PORT: i32 = 9300;

/// The HTTP service clients talk to.
fn client_service(cluster: &ElasticsearchCluster) -> Result<Service> {
    service::render(
        cluster,
        ServiceTemplate {
            name: naming::resource_base_name(cluster),
            role: "client",
            ports: vec![service_port("http", HTTP_PORT)],
            selector: labels::cluster_labels(cluster),
            headless: false,
        },
    )
}

/// The headless transport service nodes discover each other through.
fn discovery_service(cluster: &ElasticsearchCluster) -> Result<Service> {
    service::render(
        cluster,
        ServiceTemplate {
            name: naming::discovery_service_name(cluster),
            role: "discovery",
            ports: vec![service_port("transport", TRANSPORT_PORT)],
            selector: labels::cluster_labels(cluster),
            headless: true,
        },
    )
}

pub fn control(
    clients: Clients<ElasticsearchCluster>,
    recorder: Arc<dyn Recorder>,
) -> ClusterControl<ElasticsearchCluster> {
    ClusterControl::new(clients.clone(), recorder)
        .step(service::control(clients.services.clone(), client_service))
        .step(service::control(clients.services.clone(), discovery_service))
        .step(NodePoolControl::new(clients.statefulsets.clone()))
        .step(PilotControl::new(clients.pods.clone(), clients.pilots.clone()))
        .step(StatusControl::new(clients.statefulsets, clients.pilots))
        .step(rbac::service_account_control(clients.service_accounts))
        .step(rbac::role_control(clients.roles))
        .step(rbac::role_binding_control(clients.role_bindings))
}

/// Runs the Elasticsearch controller until the context is cancelled.
pub fn run(ctx: Context) -> BoxFuture<'static, Result<()>> {
    run_cluster_controller::<ElasticsearchCluster>(ctx, control).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::elasticsearch_cluster;

    #[test]
    fn services_split_http_and_transport() {
        let cluster = elasticsearch_cluster("foo", "bar", &[("data", 3)]);

        let client = client_service(&cluster).unwrap();
        assert_eq!(client.metadata.name.as_deref(), Some("es-bar"));
        let client = client.spec.unwrap();
        assert_eq!(client.ports.unwrap()[0].port, HTTP_PORT);
        assert_eq!(client.cluster_ip, None);

        let discovery = discovery_service(&cluster).unwrap();
        assert_eq!(discovery.metadata.name.as_deref(), Some("es-bar-discovery"));
        let discovery = discovery.spec.unwrap();
        assert_eq!(discovery.ports.unwrap()[0].port, TRANSPORT_PORT);
        assert_eq!(discovery.cluster_ip.as_deref(), Some("None"));
        assert_eq!(discovery.publish_not_ready_addresses, Some(true));
    }
}
