use kube_client::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    cassandra,
    controller::CancellableTask,
    controllers::{Context, Registry},
    elasticsearch, Config, Error,
};

/// The Cassandra and Elasticsearch controllers.
pub fn default_registry() -> Registry {
    Registry::new()
        .with("CassandraCluster", cassandra::run)
        .with("ElasticsearchCluster", elasticsearch::run)
}

/// Runs every controller in `registry` until `token` is cancelled.
///
/// If one controller fails the others are stopped too,
/// and the first failure is returned once all of them have exited.
pub async fn run(
    client: Client,
    config: Config,
    registry: Registry,
    token: CancellationToken,
) -> Result<(), RunError> {
    if registry.is_empty() {
        return Err(RunError::NoControllers);
    }

    let stop = token.child_token();
    let mut tasks = Vec::new();
    for (kind, run) in registry.into_entries() {
        log::info!("Starting {kind} controller");
        let ctx = Context {
            client: client.clone(),
            config: config.clone(),
            token: stop.child_token(),
        };
        let task_token = ctx.token.clone();
        let fut = {
            let stop = stop.clone();
            async move {
                let result = run(ctx).await;
                if result.is_err() {
                    stop.cancel();
                }
                result
            }
        };
        tasks.push((kind, CancellableTask::spawn(task_token, fut)));
    }

    stop.cancelled().await;

    let mut first_err = None;
    for (kind, task) in tasks {
        match task.cancel().await {
            Some(Err(err)) => {
                log::error!("{kind} controller failed: {err}");
                first_err.get_or_insert(RunError::Controller { kind, source: err });
            }
            Some(Ok(())) => log::info!("{kind} controller stopped"),
            None => log::error!("{kind} controller was aborted"),
        }
    }
    first_err.map_or(Ok(()), Err)
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no controllers registered")]
    NoControllers,
    #[error("{kind} controller failed: {source}")]
    Controller {
        kind: &'static str,
        #[source]
        source: Error,
    },
}
