//! Statefulsets running the nodes of each node pool.
//!
//! Statefulsets are created by the `CreateNodePool` action, and their replica
//! count and database image are only changed by actions.
//! This controller re-renders an existing statefulset when its drift hash changes,
//! and deletes the statefulsets of pools removed from the cluster.

use std::{collections::BTreeSet, marker::PhantomData, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy},
        core::v1::{
            Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, ObjectFieldSelector,
            PodSpec, PodTemplateSpec, SecurityContext, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube_core::{ObjectMeta, ResourceExt};

use super::object::metadata;
use crate::{
    control::{SubController, MESSAGE_ERROR_SYNC_NODE_POOLS},
    crd::{ManagedCluster, NodePool},
    hash::{compute_node_pool_hash, NODE_POOL_HASH_ANNOTATION},
    labels, naming,
    ownership::owner_check,
    store::Objects,
    Result,
};

/// Name of the container running the database under its pilot.
pub const DATABASE_CONTAINER: &str = "database";

const SHARED_VOLUME: &str = "shared";
const SHARED_PATH: &str = "/shared";
const SYSCTL_IMAGE: &str = "busybox:1.36";

fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn shared_mount() -> VolumeMount {
    VolumeMount {
        name: SHARED_VOLUME.to_string(),
        mount_path: SHARED_PATH.to_string(),
        ..VolumeMount::default()
    }
}

fn init_containers<C: ManagedCluster>(cluster: &C) -> Vec<Container> {
    let pilot_image = cluster.pilot_image();
    let mut containers = vec![Container {
        name: "install-pilot".to_string(),
        image: Some(pilot_image.reference()),
        image_pull_policy: pilot_image.pull_policy.clone(),
        command: Some(vec![
            "cp".to_string(),
            "/pilot".to_string(),
            format!("{SHARED_PATH}/pilot"),
        ]),
        volume_mounts: Some(vec![shared_mount()]),
        ..Container::default()
    }];

    if !cluster.sysctls().is_empty() {
        let mut command = vec!["sysctl".to_string(), "-w".to_string()];
        command.extend(cluster.sysctls().iter().cloned());
        containers.push(Container {
            name: "tune-sysctl".to_string(),
            image: Some(SYSCTL_IMAGE.to_string()),
            command: Some(command),
            security_context: Some(SecurityContext {
                privileged: Some(true),
                ..SecurityContext::default()
            }),
            ..Container::default()
        });
    }
    containers
}

fn database_container<C: ManagedCluster>(cluster: &C, node_pool: &NodePool) -> Container {
    let image = cluster.image_repository();
    let mut env = vec![
        field_env("POD_NAME", "metadata.name"),
        field_env("POD_NAMESPACE", "metadata.namespace"),
    ];
    env.extend(cluster.container_env(node_pool));

    Container {
        name: DATABASE_CONTAINER.to_string(),
        image: Some(image.reference(cluster.node_pool_version(node_pool))),
        image_pull_policy: image.pull_policy,
        command: Some(vec![format!("{SHARED_PATH}/pilot")]),
        args: Some(vec![
            "--pilot-name=$(POD_NAME)".to_string(),
            "--pilot-namespace=$(POD_NAMESPACE)".to_string(),
        ]),
        env: Some(env),
        ports: Some(cluster.container_ports()),
        resources: node_pool.resources.clone(),
        volume_mounts: Some(vec![shared_mount()]),
        ..Container::default()
    }
}

/// Renders the statefulset of `node_pool`, annotated with its drift hash.
pub fn statefulset<C: ManagedCluster>(cluster: &C, node_pool: &NodePool) -> Result<StatefulSet> {
    let pool_labels = labels::node_pool_labels(cluster, node_pool);
    let mut meta = metadata(
        cluster,
        naming::node_pool_resource_name(cluster, &node_pool.name),
        pool_labels.clone(),
    )?;
    meta.annotations = Some(
        [(
            NODE_POOL_HASH_ANNOTATION.to_string(),
            compute_node_pool_hash(cluster, node_pool, None)?,
        )]
        .into(),
    );

    Ok(StatefulSet {
        metadata: meta,
        spec: Some(StatefulSetSpec {
            replicas: Some(node_pool.replicas),
            service_name: naming::resource_base_name(cluster),
            pod_management_policy: Some("OrderedReady".to_string()),
            update_strategy: Some(StatefulSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..StatefulSetUpdateStrategy::default()
            }),
            selector: LabelSelector {
                match_labels: Some(labels::node_pool_selector_labels(cluster, &node_pool.name)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pool_labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(naming::resource_base_name(cluster)),
                    init_containers: Some(init_containers(cluster)),
                    containers: vec![database_container(cluster, node_pool)],
                    volumes: Some(vec![Volume {
                        name: SHARED_VOLUME.to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Volume::default()
                    }]),
                    ..PodSpec::default()
                }),
            },
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    })
}

/// The database container of a node pool statefulset.
pub fn database_container_mut(statefulset: &mut StatefulSet) -> Option<&mut Container> {
    statefulset
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .iter_mut()
        .find(|container| container.name == DATABASE_CONTAINER)
}

/// Keeps what actions own from the live statefulset.
fn carry_over(existing: &StatefulSet, desired: &mut StatefulSet) {
    desired.metadata.resource_version = existing.metadata.resource_version.clone();
    let replicas = existing.spec.as_ref().and_then(|spec| spec.replicas);
    if let Some(spec) = desired.spec.as_mut() {
        spec.replicas = replicas;
    }
    let image = existing
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| {
            pod.containers
                .iter()
                .find(|container| container.name == DATABASE_CONTAINER)
        })
        .and_then(|container| container.image.clone());
    if let (Some(image), Some(container)) = (image, database_container_mut(desired)) {
        container.image = Some(image);
    }
}

pub struct NodePoolControl<C> {
    statefulsets: Arc<dyn Objects<StatefulSet>>,
    _ph: PhantomData<fn(&C)>,
}

impl<C: ManagedCluster> NodePoolControl<C> {
    pub fn new(statefulsets: Arc<dyn Objects<StatefulSet>>) -> Self {
        Self {
            statefulsets,
            _ph: PhantomData,
        }
    }

    async fn sync_node_pools(&self, cluster: &C) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();

        for node_pool in cluster.node_pools() {
            let name = naming::node_pool_resource_name(cluster, &node_pool.name);
            let Some(existing) = self.statefulsets.get(&namespace, &name) else {
                continue;
            };
            owner_check(&*existing, cluster)?;

            let hash = compute_node_pool_hash(cluster, node_pool, None)?;
            if existing.annotations().get(NODE_POOL_HASH_ANNOTATION) == Some(&hash) {
                continue;
            }
            let mut desired = statefulset(cluster, node_pool)?;
            carry_over(&existing, &mut desired);
            log::info!("Updating statefulset {namespace}/{name} to node pool hash {hash}");
            self.statefulsets.replace(&namespace, &desired).await?;
        }

        let desired: BTreeSet<String> = cluster
            .node_pools()
            .iter()
            .map(|node_pool| naming::node_pool_resource_name(cluster, &node_pool.name))
            .collect();
        for statefulset in self
            .statefulsets
            .list(&namespace, &labels::cluster_selector(cluster))
        {
            let name = statefulset.name_any();
            if desired.contains(&name) {
                continue;
            }
            owner_check(&*statefulset, cluster)?;
            log::info!("Deleting statefulset {namespace}/{name} of removed node pool");
            self.statefulsets.delete(&namespace, &name).await?;
        }
        Ok(())
    }
}

impl<C: ManagedCluster> SubController<C> for NodePoolControl<C> {
    fn message(&self) -> &'static str {
        MESSAGE_ERROR_SYNC_NODE_POOLS
    }

    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>> {
        self.sync_node_pools(cluster).boxed()
    }
}
