//! The service account the database pods run as, and the role that lets
//! their pilots read their pod and report status.

use std::sync::Arc;

use k8s_openapi::api::{
    core::v1::ServiceAccount,
    rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject},
};
use kube_core::ResourceExt;

use super::object::{merge_field, merge_metadata, metadata, Managed, ObjectControl};
use crate::{
    control::{
        MESSAGE_ERROR_SYNC_ROLE, MESSAGE_ERROR_SYNC_ROLE_BINDING,
        MESSAGE_ERROR_SYNC_SERVICE_ACCOUNT,
    },
    crd::{ManagedCluster, GROUP},
    labels, naming,
    store::Objects,
    Result,
};

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

pub fn service_account<C: ManagedCluster>(cluster: &C) -> Result<ServiceAccount> {
    Ok(ServiceAccount {
        metadata: metadata(
            cluster,
            naming::resource_base_name(cluster),
            labels::cluster_labels(cluster),
        )?,
        ..ServiceAccount::default()
    })
}

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let strings = |values: &[&str]| -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    };
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(strings(resources)),
        verbs: strings(verbs),
        ..PolicyRule::default()
    }
}

pub fn pilot_role<C: ManagedCluster>(cluster: &C) -> Result<Role> {
    Ok(Role {
        metadata: metadata(
            cluster,
            naming::pilot_rbac_name(cluster),
            labels::cluster_labels(cluster),
        )?,
        rules: Some(vec![
            rule(GROUP, &["pilots"], &["get", "list", "watch"]),
            rule(GROUP, &["pilots/status"], &["update", "patch"]),
            rule("", &["pods"], &["get", "list", "watch"]),
            rule("", &["events"], &["create", "patch"]),
        ]),
    })
}

pub fn pilot_role_binding<C: ManagedCluster>(cluster: &C) -> Result<RoleBinding> {
    Ok(RoleBinding {
        metadata: metadata(
            cluster,
            naming::pilot_rbac_name(cluster),
            labels::cluster_labels(cluster),
        )?,
        role_ref: RoleRef {
            api_group: RBAC_GROUP.to_string(),
            kind: "Role".to_string(),
            name: naming::pilot_rbac_name(cluster),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: naming::resource_base_name(cluster),
            namespace: cluster.namespace(),
            ..Subject::default()
        }]),
    })
}

impl Managed for ServiceAccount {
    fn merge_from(&mut self, desired: &Self) -> bool {
        merge_metadata(self, desired)
    }
}

impl Managed for Role {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let metadata = merge_metadata(self, desired);
        let rules = merge_field(&mut self.rules, &desired.rules);
        metadata || rules
    }
}

impl Managed for RoleBinding {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let metadata = merge_metadata(self, desired);
        let subjects = merge_field(&mut self.subjects, &desired.subjects);
        metadata || subjects
    }
}

pub fn service_account_control<C: ManagedCluster>(
    service_accounts: Arc<dyn Objects<ServiceAccount>>,
) -> ObjectControl<C, ServiceAccount> {
    ObjectControl::new(
        service_accounts,
        service_account,
        MESSAGE_ERROR_SYNC_SERVICE_ACCOUNT,
    )
}

pub fn role_control<C: ManagedCluster>(roles: Arc<dyn Objects<Role>>) -> ObjectControl<C, Role> {
    ObjectControl::new(roles, pilot_role, MESSAGE_ERROR_SYNC_ROLE)
}

pub fn role_binding_control<C: ManagedCluster>(
    role_bindings: Arc<dyn Objects<RoleBinding>>,
) -> ObjectControl<C, RoleBinding> {
    ObjectControl::new(role_bindings, pilot_role_binding, MESSAGE_ERROR_SYNC_ROLE_BINDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ownership::is_controlled_by, testing::elasticsearch_cluster};

    #[test]
    fn binding_grants_pilot_role_to_service_account() {
        let cluster = elasticsearch_cluster("foo", "bar", &[]);
        let account = service_account(&cluster).unwrap();
        let role = pilot_role(&cluster).unwrap();
        let binding = pilot_role_binding(&cluster).unwrap();

        assert_eq!(account.name_any(), "es-bar");
        assert_eq!(role.name_any(), "es-bar-pilot");
        assert_eq!(binding.role_ref.name, role.name_any());
        let subject = &binding.subjects.as_ref().unwrap()[0];
        assert_eq!(subject.name, account.name_any());
        assert_eq!(subject.namespace.as_deref(), Some("foo"));
        assert!(is_controlled_by(&binding, &cluster));
    }

    #[test]
    fn role_rules_are_restored() {
        let cluster = elasticsearch_cluster("foo", "bar", &[]);
        let desired = pilot_role(&cluster).unwrap();
        let mut live = desired.clone();
        assert!(!live.merge_from(&desired));
        live.rules = None;
        assert!(live.merge_from(&desired));
        assert_eq!(live, desired);
    }
}
