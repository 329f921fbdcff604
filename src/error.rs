use thiserror::Error;

/// Errors raised while reconciling a cluster or running its controller.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write against the API server failed.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube_client::Error),

    /// A derived resource exists under the expected name but is controlled by someone else.
    #[error("'{namespace}/{name}' is foreign owned: it is owned by '{owner}', not '{namespace}/{cluster}'")]
    ForeignOwned {
        namespace: String,
        name: String,
        /// The controlling owner found on the object, or `<none>`.
        owner: String,
        cluster: String,
    },

    /// An object is missing metadata that the controller relies on.
    #[error("{kind} is missing metadata field {field}")]
    MissingMetadata { kind: String, field: &'static str },

    /// A work queue key could not be split into namespace and name.
    #[error("invalid resource key: {0:?}")]
    InvalidKey(String),

    /// A derived resource name does not follow the naming convention.
    #[error("not a node pool resource name: expected '<prefix>-<cluster>-<pool>', got {0:?}")]
    InvalidResourceName(String),

    /// An object could not be serialized, e.g. while computing a drift hash.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A watch cache stopped before completing its initial list.
    #[error("cache for {0} stopped before the initial sync completed")]
    CacheSync(String),

    /// An action required a statefulset that is not in the cache.
    #[error("statefulset '{namespace}/{name}' not found")]
    StatefulSetNotFound { namespace: String, name: String },

    /// Executing the planned action failed.
    #[error("failure while executing action {action}: {source}")]
    Action {
        action: &'static str,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(err) if is_status(err, 404))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube(err) if is_status(err, 409))
    }
}

pub(crate) fn is_status(err: &kube_client::Error, code: u16) -> bool {
    matches!(err, kube_client::Error::Api(response) if response.code == code)
}
