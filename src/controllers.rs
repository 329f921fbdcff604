//! Sub-resource controllers and what the per-kind controllers are assembled from.

use std::{collections::BTreeMap, sync::Arc};

use futures::future::BoxFuture;
use k8s_openapi::api::{
    apps::v1::StatefulSet,
    core::v1::{Pod, Service, ServiceAccount},
    rbac::v1::{Role, RoleBinding},
};
use kube_client::Client;
use tokio_util::sync::CancellationToken;

use crate::{
    control::ClusterControl,
    controller::Controller,
    crd::{ManagedCluster, Pilot},
    events::{KubeRecorder, Recorder},
    labels,
    queue::{default_controller_rate_limiter, WorkQueue},
    store::{HasSynced, Object, Objects},
    subscriber::{KubeObjects, QualifiedName},
    Config, Result,
};

pub mod nodepool;
pub mod object;
pub mod pilot;
pub mod rbac;
pub mod seedlabeller;
pub mod service;
pub mod status;

/// Access to the cluster kind `C` and every kind derived from it.
pub struct Clients<C> {
    pub clusters: Arc<dyn Objects<C>>,
    pub services: Arc<dyn Objects<Service>>,
    pub statefulsets: Arc<dyn Objects<StatefulSet>>,
    pub pods: Arc<dyn Objects<Pod>>,
    pub pilots: Arc<dyn Objects<Pilot>>,
    pub service_accounts: Arc<dyn Objects<ServiceAccount>>,
    pub roles: Arc<dyn Objects<Role>>,
    pub role_bindings: Arc<dyn Objects<RoleBinding>>,
}

impl<C> Clone for Clients<C> {
    fn clone(&self) -> Self {
        Self {
            clusters: Arc::clone(&self.clusters),
            services: Arc::clone(&self.services),
            statefulsets: Arc::clone(&self.statefulsets),
            pods: Arc::clone(&self.pods),
            pilots: Arc::clone(&self.pilots),
            service_accounts: Arc::clone(&self.service_accounts),
            roles: Arc::clone(&self.roles),
            role_bindings: Arc::clone(&self.role_bindings),
        }
    }
}

/// What a registered controller is started with.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub config: Config,
    /// Cancelled when the controller should shut down.
    pub token: CancellationToken,
}

/// Starts one controller and resolves when it has shut down.
pub type RunFn = fn(Context) -> BoxFuture<'static, Result<()>>;

/// The controllers to run, by the kind they reconcile.
///
/// Assembled explicitly by the caller of [`run`](crate::run).
#[derive(Default)]
pub struct Registry {
    controllers: BTreeMap<&'static str, RunFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the controller for `kind`, replacing any previous one.
    pub fn with(mut self, kind: &'static str, run: RunFn) -> Self {
        self.controllers.insert(kind, run);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.controllers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (&'static str, RunFn)> {
        self.controllers.into_iter()
    }
}

/// Enqueues the key of the `C` cluster a changed child belongs to.
fn enqueue_owner<C: ManagedCluster, K: Object>(
    queue: &WorkQueue<QualifiedName>,
) -> impl Fn(&K) + Send + 'static {
    let queue = queue.clone();
    move |child: &K| {
        if let Some(key) = labels::owning_cluster::<C, K>(child) {
            queue.add(key);
        }
    }
}

/// Watches `C` and its children and runs a worker pool around the pipeline made by `build`.
pub(crate) async fn run_cluster_controller<C: ManagedCluster>(
    ctx: Context,
    build: fn(Clients<C>, Arc<dyn Recorder>) -> ClusterControl<C>,
) -> Result<()> {
    let Context {
        client,
        config,
        token,
    } = ctx;
    let namespace = config.namespace.as_deref();
    let queue = WorkQueue::new(default_controller_rate_limiter(&config.rate_limiter));

    let clusters = Arc::new(KubeObjects::<C>::watch(
        client.clone(),
        namespace,
        token.clone(),
        {
            let queue = queue.clone();
            move |cluster: &C| queue.add(QualifiedName::from_resource(cluster))
        },
    ));
    macro_rules! child {
        ($kind:ty) => {
            Arc::new(KubeObjects::<$kind>::watch(
                client.clone(),
                namespace,
                token.clone(),
                enqueue_owner::<C, $kind>(&queue),
            ))
        };
    }
    let services = child!(Service);
    let statefulsets = child!(StatefulSet);
    let pods = child!(Pod);
    let pilots = child!(Pilot);
    let service_accounts = child!(ServiceAccount);
    let roles = child!(Role);
    let role_bindings = child!(RoleBinding);

    let caches: Vec<Arc<dyn HasSynced>> = vec![
        clusters.clone(),
        services.clone(),
        statefulsets.clone(),
        pods.clone(),
        pilots.clone(),
        service_accounts.clone(),
        roles.clone(),
        role_bindings.clone(),
    ];
    let clients = Clients {
        clusters: clusters.clone(),
        services,
        statefulsets,
        pods,
        pilots,
        service_accounts,
        roles,
        role_bindings,
    };
    let recorder: Arc<dyn Recorder> = Arc::new(KubeRecorder::new(client, config.reporter.clone()));
    let control = build(clients, recorder);

    caches
        .into_iter()
        .fold(
            Controller::<C>::new(C::kind(&()), queue, clusters, Arc::new(control)),
            Controller::wait_for,
        )
        .run(config.workers, token)
        .await
}
