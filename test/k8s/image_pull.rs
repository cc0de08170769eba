use crate::common::K8sEnv;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use runtime_conformance::conformance::{
    AttemptOrchestrator, AttemptResult, AttemptRunner, Expectation, FlakyRetryDriver,
    NoPrerequisites, PodPhase, PollConfig, WorkloadSpec,
};
use runtime_conformance::context::Context;
use runtime_conformance::k8s::pods::K8sWorkloadClient;
use std::sync::Arc;
use std::time::Duration;

const RUNNING_IMAGE: &str = "registry.k8s.io/pause:3.9";
const MISSING_IMAGE: &str = "registry.k8s.io/runtime-conformance/does-not-exist:latest";

fn poll_config() -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(1),
        deadline: Duration::from_secs(2 * 60),
    }
}

// tokio test runs with 1 thread by default causing deadlock when executing `block_on` code (clean-up).
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "needs k8s cluster"]
async fn k8s_public_image_reaches_running() -> Result<(), Box<dyn std::error::Error>> {
    let test = K8sEnv::new().await?;
    let client = Arc::new(K8sWorkloadClient::new(test.client.clone(), test.namespace()));
    let orchestrator = AttemptOrchestrator::new(client, NoPrerequisites, Context::new())
        .with_poll_config(poll_config());

    FlakyRetryDriver::new(orchestrator)
        .run(
            &WorkloadSpec::new("image-pull-test", RUNNING_IMAGE),
            &Expectation::running(PodPhase::Running),
        )
        .await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "needs k8s cluster"]
async fn k8s_missing_image_keeps_waiting() -> Result<(), Box<dyn std::error::Error>> {
    let test = K8sEnv::new().await?;
    let client = Arc::new(K8sWorkloadClient::new(test.client.clone(), test.namespace()));
    let orchestrator = AttemptOrchestrator::new(client, NoPrerequisites, Context::new())
        .with_poll_config(poll_config());

    let result = orchestrator
        .run_attempt(
            &WorkloadSpec::new("image-pull-test", MISSING_IMAGE),
            &Expectation::waiting(PodPhase::Pending),
        )
        .await?;
    assert_eq!(result, AttemptResult::Success);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "needs k8s cluster"]
async fn k8s_failed_attempt_deletes_its_workload() -> Result<(), Box<dyn std::error::Error>> {
    let test = K8sEnv::new().await?;
    let client = Arc::new(K8sWorkloadClient::new(test.client.clone(), test.namespace()));
    let orchestrator = AttemptOrchestrator::new(client, NoPrerequisites, Context::new())
        .with_poll_config(PollConfig {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(5),
        });

    // the image never runs, so the attempt times out
    let result = orchestrator
        .run_attempt(
            &WorkloadSpec::new("image-pull-test", MISSING_IMAGE),
            &Expectation::running(PodPhase::Running),
        )
        .await?;
    assert!(matches!(result, AttemptResult::Failure(_)));

    let pods: Api<Pod> = Api::namespaced(test.client.clone(), test.namespace());
    let remaining = pods.list(&ListParams::default()).await?;
    assert!(remaining
        .items
        .iter()
        .all(|pod| pod.metadata.deletion_timestamp.is_some()));

    Ok(())
}
