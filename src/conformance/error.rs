use crate::context::Cancelled;
use crate::credentials::CredentialsError;
use crate::k8s::error::K8sError;
use thiserror::Error;

/// Prerequisites of an attempt could not be provisioned. Points to a setup bug, so it is never
/// retried.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("provisioning the registry fixture: `{0}`")]
    Registry(#[from] K8sError),

    #[error("the registry fixture has no eligible node to run the workload")]
    NoEligibleNodes,

    #[error("writing the registry credentials: `{0}`")]
    Credentials(#[from] CredentialsError),
}

#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("{0}")]
    K8s(#[from] K8sError),

    #[error("unexpected container statuses in pod `{pod}`: container `{container}` not found")]
    ContainerStatusNotFound { pod: String, container: String },
}

impl From<kube::Error> for WorkloadError {
    fn from(err: kube::Error) -> Self {
        WorkloadError::K8s(err.into())
    }
}

/// An attempt that ended without producing a verdict.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("{0}")]
    Setup(#[from] SetupError),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

/// Result of a whole verification run that did not succeed.
#[derive(Error, Debug)]
pub enum FinalError {
    #[error("All {attempts} attempts failed: {diagnostic}")]
    AttemptsExhausted { attempts: usize, diagnostic: String },

    #[error("setting up attempt {attempts} failed: {source}")]
    Setup {
        attempts: usize,
        #[source]
        source: SetupError,
    },

    #[error("verification cancelled during attempt {attempts}")]
    Cancelled { attempts: usize },

    #[error("the attempt budget must allow at least one attempt")]
    NoAttempts,
}

impl FinalError {
    /// Number of attempts that were started before the run ended.
    pub fn attempts(&self) -> usize {
        match self {
            FinalError::AttemptsExhausted { attempts, .. }
            | FinalError::Setup { attempts, .. }
            | FinalError::Cancelled { attempts } => *attempts,
            FinalError::NoAttempts => 0,
        }
    }
}
