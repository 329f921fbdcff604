//! The per-cluster sync pipeline.

use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use kube_core::ResourceExt;

use crate::{
    actions,
    controllers::Clients,
    crd::ManagedCluster,
    events::{EventType, Recorder},
    planner, Result,
};

/// Reason of the warning emitted when a sync fails.
pub const ERROR_SYNC: &str = "ErrSync";
/// Reason of the event emitted when a sync succeeds.
pub const SUCCESS_SYNC: &str = "SuccessSync";

pub const MESSAGE_ERROR_SYNC_SERVICE: &str = "Error syncing service";
pub const MESSAGE_ERROR_SYNC_NODE_POOLS: &str = "Error syncing node pools";
pub const MESSAGE_ERROR_SYNC_PILOTS: &str = "Error syncing pilots";
pub const MESSAGE_ERROR_SYNC_STATUS: &str = "Error syncing node pool status";
pub const MESSAGE_ERROR_SYNC_SERVICE_ACCOUNT: &str = "Error syncing service account";
pub const MESSAGE_ERROR_SYNC_ROLE: &str = "Error syncing role";
pub const MESSAGE_ERROR_SYNC_ROLE_BINDING: &str = "Error syncing role binding";
pub const MESSAGE_ERROR_SYNC_SEED_LABELS: &str = "Error syncing seed labels";
pub const MESSAGE_ERROR_SYNC: &str = "Error syncing";
pub const MESSAGE_ERROR_UPDATE_STATUS: &str = "Error updating cluster status";

/// Reconciles one object. This is what a [`Controller`](crate::controller::Controller) drives.
pub trait Control<K>: Send + Sync {
    fn sync<'a>(&'a self, object: &'a K) -> BoxFuture<'a, Result<()>>;
}

/// One step of a [`ClusterControl`] pipeline, usually one kind of derived resource.
pub trait SubController<C>: Send + Sync {
    /// Prefix of the warning message emitted when this step fails.
    fn message(&self) -> &'static str;

    /// Brings the resources of this step in line with `cluster`.
    ///
    /// A step may update the in-memory status of `cluster`;
    /// only the pipeline persists it.
    fn sync<'a>(&'a self, cluster: &'a mut C) -> BoxFuture<'a, Result<()>>;
}

/// Runs the sub-controllers of a cluster in order, then the next planned action.
///
/// The first failing step aborts the sync.
pub struct ClusterControl<C> {
    clients: Clients<C>,
    recorder: Arc<dyn Recorder>,
    steps: Vec<Box<dyn SubController<C>>>,
}

impl<C: ManagedCluster> ClusterControl<C> {
    pub fn new(clients: Clients<C>, recorder: Arc<dyn Recorder>) -> Self {
        Self {
            clients,
            recorder,
            steps: Vec::new(),
        }
    }

    /// Appends a step to the pipeline.
    pub fn step(mut self, step: impl SubController<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    async fn warn(&self, cluster: &C, message: &str, err: &crate::Error) {
        self.recorder
            .publish(
                &cluster.object_ref(&()),
                EventType::Warning,
                ERROR_SYNC,
                format!("{message}: {err}"),
            )
            .await;
    }

    async fn sync_cluster(&self, observed: &C) -> Result<()> {
        let mut cluster = observed.clone();

        for step in &self.steps {
            if let Err(err) = step.sync(&mut cluster).await {
                self.warn(&cluster, step.message(), &err).await;
                return Err(err);
            }
        }

        let action = planner::next_action(&cluster);
        let state = actions::State {
            clients: &self.clients,
            recorder: &*self.recorder,
        };
        if let Err(err) = actions::execute(&state, &action).await {
            self.warn(&cluster, MESSAGE_ERROR_SYNC, &err).await;
            return Err(err);
        }

        if cluster.cluster_status() != observed.cluster_status() {
            let namespace = cluster.namespace().unwrap_or_default();
            if let Err(err) = self
                .clients
                .clusters
                .replace_status(&namespace, &cluster)
                .await
            {
                self.warn(&cluster, MESSAGE_ERROR_UPDATE_STATUS, &err).await;
                return Err(err);
            }
        }

        self.recorder
            .publish(
                &cluster.object_ref(&()),
                EventType::Normal,
                SUCCESS_SYNC,
                format!("Successfully synced {}", C::kind(&())),
            )
            .await;
        Ok(())
    }
}

impl<C: ManagedCluster> Control<C> for ClusterControl<C> {
    fn sync<'a>(&'a self, cluster: &'a C) -> BoxFuture<'a, Result<()>> {
        self.sync_cluster(cluster).boxed()
    }
}
