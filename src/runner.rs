use crate::config::error::ConfigError;
use crate::config::{ConformanceConfig, TestCase};
use crate::conformance::{
    AttemptOrchestrator, FinalError, FlakyRetryDriver, NoPrerequisites, Prerequisites,
    RegistryPrerequisites, WorkloadClient, WorkloadSpec,
};
use crate::context::Context;
use crate::credentials::{FileCredentialWriter, KUBELET_CREDENTIALS_FILE};
use crate::k8s::client::create_client;
use crate::k8s::error::K8sError;
use crate::k8s::namespace::TestNamespace;
use crate::k8s::pods::K8sWorkloadClient;
use crate::k8s::registry::K8sRegistryProvisioner;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Name of the workload created by every attempt.
pub const WORKLOAD_NAME: &str = "image-pull-test";

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("invalid configuration: `{0}`")]
    Config(#[from] ConfigError),

    #[error("kubernetes error: `{0}`")]
    K8s(#[from] K8sError),

    #[error("{failed} of {total} test cases failed")]
    CasesFailed { failed: usize, total: usize },
}

/// Result of verifying one test case.
#[derive(Debug)]
pub struct CaseOutcome {
    pub description: String,
    pub result: Result<(), FinalError>,
}

/// Runs every configured test case against the cluster, one after the other.
pub struct SuiteRunner {
    config: ConformanceConfig,
    ctx: Context,
}

impl SuiteRunner {
    pub fn new(config: ConformanceConfig, ctx: Context) -> Self {
        Self { config, ctx }
    }

    /// Creates the test namespace, the registry fixture when a case needs it, and verifies the
    /// cases. Everything created is removed before returning.
    pub async fn run(&self) -> Result<Vec<CaseOutcome>, RunnerError> {
        self.config.validate()?;

        let client = create_client("default").await?;
        let namespace = TestNamespace::create(client.clone(), &self.config.namespace_prefix).await?;
        info!(namespace = %namespace.name(), "test namespace ready");

        let workloads = Arc::new(K8sWorkloadClient::new(client.clone(), namespace.name()));
        let registry = self
            .config
            .registry
            .as_ref()
            .filter(|_| self.config.needs_registry())
            .map(|registry| {
                let provisioner = K8sRegistryProvisioner::new(
                    client.clone(),
                    namespace.name(),
                    registry.clone(),
                    self.ctx.clone(),
                );
                Arc::new(
                    RegistryPrerequisites::new(
                        provisioner,
                        Arc::new(FileCredentialWriter),
                        registry.credentials.clone(),
                        self.config.kubelet_root_dir.join(KUBELET_CREDENTIALS_FILE),
                    )
                    .with_host_binding(registry.host_binding),
                )
            });

        let timer = self.config.timeout.map(|timeout| SuiteTimer::arm(timeout, self.ctx.clone()));
        let outcomes = self.run_cases(workloads, registry.clone()).await;
        drop(timer);

        // credentials go before the namespace holding the registry
        drop(registry);
        drop(namespace);

        Ok(outcomes)
    }

    /// Verifies the cases in order. Cases that set up a registry share `registry`, the rest run
    /// without prerequisites. A cancelled case ends the run.
    pub async fn run_cases<C, P>(&self, workloads: Arc<C>, registry: Option<P>) -> Vec<CaseOutcome>
    where
        C: WorkloadClient + 'static,
        P: Prerequisites + Clone,
    {
        let mut outcomes = Vec::with_capacity(self.config.cases.len());
        for case in &self.config.cases {
            info!(case = %case.description, image = %case.image, "verifying test case");
            let result = match registry.as_ref().filter(|_| case.setup_registry) {
                Some(registry) => self.verify(workloads.clone(), registry.clone(), case).await,
                None => self.verify(workloads.clone(), NoPrerequisites, case).await,
            };

            match &result {
                Ok(()) => info!(case = %case.description, "test case passed"),
                Err(err) => error!(case = %case.description, "test case failed: {err}"),
            }
            let cancelled = matches!(result, Err(FinalError::Cancelled { .. }));
            outcomes.push(CaseOutcome {
                description: case.description.clone(),
                result,
            });
            if cancelled {
                break;
            }
        }
        outcomes
    }

    async fn verify<C, P>(
        &self,
        workloads: Arc<C>,
        prerequisites: P,
        case: &TestCase,
    ) -> Result<(), FinalError>
    where
        C: WorkloadClient + 'static,
        P: Prerequisites,
    {
        let orchestrator = AttemptOrchestrator::new(workloads, prerequisites, self.ctx.clone())
            .with_poll_config(self.config.poll);
        FlakyRetryDriver::new(orchestrator)
            .with_max_attempts(self.config.max_attempts)
            .run(
                &WorkloadSpec::new(WORKLOAD_NAME, &case.image),
                &case.expectation,
            )
            .await
    }
}

/// Cancels the context once the suite timeout elapses. Disarmed when dropped.
struct SuiteTimer(tokio::task::JoinHandle<()>);

impl SuiteTimer {
    fn arm(timeout: Duration, ctx: Context) -> Self {
        SuiteTimer(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("run timed out after {timeout:?}, cancelling");
            ctx.cancel_all();
        }))
    }
}

impl Drop for SuiteTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fails unless every configured case ran and passed.
pub fn summarize(outcomes: &[CaseOutcome], total: usize) -> Result<(), RunnerError> {
    let passed = outcomes.iter().filter(|o| o.result.is_ok()).count();
    if passed == total {
        return Ok(());
    }
    Err(RunnerError::CasesFailed {
        failed: total - passed,
        total,
    })
}
