use crate::context::Cancelled;
use kube::config::{InClusterError, KubeconfigError};

#[derive(thiserror::Error, Debug)]
pub enum K8sError {
    #[error("the kube client returned an error: `{0}`")]
    Generic(#[from] kube::Error),

    #[error("it is not possible to read kubeconfig: `{0}`")]
    UnableToSetupClientKubeconfig(#[from] KubeconfigError),

    #[error("it is not possible to read the in-cluster config: `{0}`")]
    UnableToSetupClientInCluster(#[from] InClusterError),

    #[error("the created `{0}` has no name")]
    MissingName(String),

    #[error("registry pod `{0}` did not become ready in time")]
    RegistryNotReady(String),

    #[error("registry pod `{name}` ended in phase {phase} before serving")]
    RegistryTerminated { name: String, phase: String },

    #[error("registry pod `{0}` was not scheduled to any node")]
    RegistryNotScheduled(String),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

impl K8sError {
    /// True when the api server answered that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, K8sError::Generic(kube::Error::Api(response)) if response.code == 404)
    }

    /// True when the api server refused a create because the object is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, K8sError::Generic(kube::Error::Api(response)) if response.code == 409)
    }
}
