//! Services in front of the database pods.

use std::{collections::BTreeMap, sync::Arc};

use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};

use super::object::{merge_field, merge_metadata, metadata, Managed, ObjectControl, Render};
use crate::{
    control::MESSAGE_ERROR_SYNC_SERVICE, crd::ManagedCluster, labels, store::Objects, Result,
};

/// How a service of a cluster should look.
pub struct ServiceTemplate {
    pub name: String,
    /// Distinguishes this service from the other services of the cluster.
    pub role: &'static str,
    pub ports: Vec<ServicePort>,
    /// Labels of the pods behind the service.
    pub selector: BTreeMap<String, String>,
    /// Headless services resolve to every pod, ready or not.
    pub headless: bool,
}

/// A TCP service port forwarding to the same container port.
pub fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        protocol: Some("TCP".to_string()),
        target_port: Some(IntOrString::Int(port)),
        ..ServicePort::default()
    }
}

pub fn render<C: ManagedCluster>(cluster: &C, template: ServiceTemplate) -> Result<Service> {
    let labels = labels::service_labels(cluster, template.role);
    Ok(Service {
        metadata: metadata(cluster, template.name, labels)?,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            cluster_ip: template.headless.then(|| "None".to_string()),
            publish_not_ready_addresses: template.headless.then_some(true),
            ports: Some(template.ports),
            selector: Some(template.selector),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    })
}

impl Managed for Service {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let mut changed = merge_metadata(self, desired);
        let desired = desired.spec.clone().unwrap_or_default();
        let spec = self.spec.get_or_insert_with(ServiceSpec::default);
        changed |= merge_field(&mut spec.type_, &desired.type_);
        changed |= merge_field(&mut spec.ports, &desired.ports);
        changed |= merge_field(&mut spec.selector, &desired.selector);
        // The server drops `false`, so an unset flag and `false` are the same.
        if spec.publish_not_ready_addresses.unwrap_or(false)
            != desired.publish_not_ready_addresses.unwrap_or(false)
        {
            spec.publish_not_ready_addresses = desired.publish_not_ready_addresses;
            changed = true;
        }
        // The cluster IP is assigned by the server and cannot change afterwards.
        if spec.cluster_ip.is_none() {
            changed |= merge_field(&mut spec.cluster_ip, &desired.cluster_ip);
        }
        changed
    }
}

pub fn control<C: ManagedCluster>(
    services: Arc<dyn Objects<Service>>,
    render: Render<C, Service>,
) -> ObjectControl<C, Service> {
    ObjectControl::new(services, render, MESSAGE_ERROR_SYNC_SERVICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cassandra_cluster;

    fn template(headless: bool) -> ServiceTemplate {
        ServiceTemplate {
            name: "cass-bar".to_string(),
            role: "nodes",
            ports: vec![service_port("cql", 9042)],
            selector: BTreeMap::from([("app".to_string(), "db".to_string())]),
            headless,
        }
    }

    #[test]
    fn merge_keeps_assigned_cluster_ip() {
        let cluster = cassandra_cluster("foo", "bar", &[]);
        let desired = render(&cluster, template(false)).unwrap();

        let mut live = desired.clone();
        live.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.12".to_string());
        assert!(!live.merge_from(&desired));

        live.spec.as_mut().unwrap().ports = Some(vec![service_port("cql", 9043)]);
        assert!(live.merge_from(&desired));
        assert_eq!(live.spec.as_ref().unwrap().ports, desired.spec.as_ref().unwrap().ports);
        assert_eq!(live.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.12"));
    }

    #[test]
    fn unset_publish_flag_matches_regular_service() {
        let cluster = cassandra_cluster("foo", "bar", &[]);
        let desired = render(&cluster, template(false)).unwrap();

        let mut live = desired.clone();
        let spec = live.spec.as_mut().unwrap();
        spec.cluster_ip = Some("10.0.0.1".to_string());
        spec.publish_not_ready_addresses = None;
        assert!(!live.merge_from(&desired));

        live.spec.as_mut().unwrap().publish_not_ready_addresses = Some(false);
        assert!(!live.merge_from(&desired));

        live.spec.as_mut().unwrap().publish_not_ready_addresses = Some(true);
        assert!(live.merge_from(&desired));
        assert_eq!(live.spec.unwrap().publish_not_ready_addresses, None);
    }

    #[test]
    fn headless_services_publish_unready_pods() {
        let cluster = cassandra_cluster("foo", "bar", &[]);
        let spec = render(&cluster, template(true)).unwrap().spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
    }
}
