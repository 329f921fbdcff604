//! Execution of the action chosen by the planner.
//!
//! Every action is a no-op when the change it makes is already in place,
//! so a replanned action after a stale read is harmless.

use k8s_openapi::api::apps::v1::StatefulSet;
use kube_core::ResourceExt;

use crate::{
    controllers::{nodepool, Clients},
    crd::{ManagedCluster, NodePool},
    events::{EventType, Recorder},
    naming,
    ownership::owner_check,
    planner::Action,
    Error, Result,
};

/// What actions act through.
pub struct State<'a, C> {
    pub clients: &'a Clients<C>,
    pub recorder: &'a dyn Recorder,
}

/// Executes `action`, emitting a Normal event named after it if anything changed.
pub async fn execute<C: ManagedCluster>(
    state: &State<'_, C>,
    action: &Action<'_, C>,
) -> Result<()> {
    let (cluster, changed) = match *action {
        Action::CreateNodePool { cluster, node_pool } => {
            (cluster, create_node_pool(state, cluster, node_pool).await)
        }
        Action::ScaleOut { cluster, node_pool } => {
            (cluster, scale_out(state, cluster, node_pool).await)
        }
        Action::UpdateVersion { cluster, node_pool } => {
            (cluster, update_version(state, cluster, node_pool).await)
        }
        Action::None => return Ok(()),
    };

    let message = match changed {
        Ok(Some(message)) => message,
        Ok(None) => return Ok(()),
        Err(err) => {
            return Err(Error::Action {
                action: action.name(),
                source: Box::new(err),
            })
        }
    };
    log::info!(
        "{} {}/{}: {message}",
        action.name(),
        cluster.namespace().unwrap_or_default(),
        cluster.name_any()
    );
    state
        .recorder
        .publish(
            &cluster.object_ref(&()),
            EventType::Normal,
            action.name(),
            message,
        )
        .await;
    Ok(())
}

/// The statefulset of `node_pool`, which must exist and be owned by `cluster`.
fn owned_statefulset<C: ManagedCluster>(
    state: &State<'_, C>,
    cluster: &C,
    node_pool: &NodePool,
) -> Result<StatefulSet> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = naming::node_pool_resource_name(cluster, &node_pool.name);
    let existing = state
        .clients
        .statefulsets
        .get(&namespace, &name)
        .ok_or(Error::StatefulSetNotFound { namespace, name })?;
    owner_check(&*existing, cluster)?;
    Ok((*existing).clone())
}

async fn create_node_pool<C: ManagedCluster>(
    state: &State<'_, C>,
    cluster: &C,
    node_pool: &NodePool,
) -> Result<Option<String>> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = naming::node_pool_resource_name(cluster, &node_pool.name);
    if let Some(existing) = state.clients.statefulsets.get(&namespace, &name) {
        owner_check(&*existing, cluster)?;
        return Ok(None);
    }

    let statefulset = nodepool::statefulset(cluster, node_pool)?;
    state
        .clients
        .statefulsets
        .create(&namespace, &statefulset)
        .await?;
    Ok(Some(format!(
        "Created node pool {} with {} replicas",
        node_pool.name, node_pool.replicas
    )))
}

async fn scale_out<C: ManagedCluster>(
    state: &State<'_, C>,
    cluster: &C,
    node_pool: &NodePool,
) -> Result<Option<String>> {
    let mut statefulset = owned_statefulset(state, cluster, node_pool)?;
    let spec = statefulset.spec.get_or_insert_with(Default::default);
    let current = spec.replicas.unwrap_or(1);
    if current >= node_pool.replicas {
        return Ok(None);
    }

    spec.replicas = Some(node_pool.replicas);
    let namespace = cluster.namespace().unwrap_or_default();
    state
        .clients
        .statefulsets
        .replace(&namespace, &statefulset)
        .await?;
    Ok(Some(format!(
        "Scaled node pool {} from {current} to {} replicas",
        node_pool.name, node_pool.replicas
    )))
}

async fn update_version<C: ManagedCluster>(
    state: &State<'_, C>,
    cluster: &C,
    node_pool: &NodePool,
) -> Result<Option<String>> {
    let mut statefulset = owned_statefulset(state, cluster, node_pool)?;
    let version = cluster.node_pool_version(node_pool);
    let image = cluster.image_repository().reference(version);

    let Some(container) = nodepool::database_container_mut(&mut statefulset) else {
        return Err(Error::MissingMetadata {
            kind: "StatefulSet".to_string(),
            field: "spec.template.spec.containers[database]",
        });
    };
    if container.image.as_deref() == Some(image.as_str()) {
        return Ok(None);
    }
    container.image = Some(image);

    let namespace = cluster.namespace().unwrap_or_default();
    state
        .clients
        .statefulsets
        .replace(&namespace, &statefulset)
        .await?;
    Ok(Some(format!(
        "Updated node pool {} to version {version}",
        node_pool.name
    )))
}
