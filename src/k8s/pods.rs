use super::error::K8sError;
use super::labels::DefaultLabels;
use crate::conformance::{
    ObservedStatus, PodPhase, RunState, WorkloadClient, WorkloadError, WorkloadHandle,
    WorkloadSpec,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ContainerState, Pod, PodSpec};
use kube::api::{DeleteParams, PostParams};
use kube::core::ObjectMeta;
use kube::{Api, Client};
use tracing::debug;

/// Makes sure the image is pulled even if the node already has it.
const IMAGE_PULL_POLICY_ALWAYS: &str = "Always";
const RESTART_POLICY_NEVER: &str = "Never";

/// [`WorkloadClient`] backed by single-container pods.
pub struct K8sWorkloadClient {
    pods: Api<Pod>,
    namespace: String,
}

impl K8sWorkloadClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl WorkloadClient for K8sWorkloadClient {
    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadHandle, WorkloadError> {
        let created = self
            .pods
            .create(&PostParams::default(), &pod_manifest(spec))
            .await?;
        let pod_name = created
            .metadata
            .name
            .ok_or_else(|| K8sError::MissingName("pod".to_string()))?;
        debug!(pod = %pod_name, namespace = %self.namespace, "pod created");

        Ok(WorkloadHandle {
            pod_name,
            container_name: spec.name.clone(),
            namespace: self.namespace.clone(),
            node_name: spec.node_name.clone(),
        })
    }

    async fn get_workload_status(
        &self,
        handle: &WorkloadHandle,
    ) -> Result<ObservedStatus, WorkloadError> {
        let pod = self.pods.get(&handle.pod_name).await?;
        observed_status(&pod, &handle.container_name)
    }

    async fn delete_workload(&self, handle: &WorkloadHandle) -> Result<(), WorkloadError> {
        match self
            .pods
            .delete(&handle.pod_name, &DeleteParams::default())
            .await
            .map_err(K8sError::from)
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!(pod = %handle.pod_name, "pod already deleted");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Every attempt gets a new pod name so it never collides with a pod of a previous attempt that
/// is still terminating.
fn pod_manifest(spec: &WorkloadSpec) -> Pod {
    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", spec.name)),
            labels: Some(DefaultLabels::new().with_workload(&spec.name).get()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: spec.name.clone(),
                image: Some(spec.image.clone()),
                image_pull_policy: Some(IMAGE_PULL_POLICY_ALWAYS.to_string()),
                ..Default::default()
            }],
            restart_policy: Some(RESTART_POLICY_NEVER.to_string()),
            node_name: spec.node_name.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Reads the state of `container` and the phase of `pod`.
///
/// A pod that does not report the container yet is an error, the caller polls again.
pub fn observed_status(pod: &Pod, container: &str) -> Result<ObservedStatus, WorkloadError> {
    let not_found = || WorkloadError::ContainerStatusNotFound {
        pod: pod.metadata.name.clone().unwrap_or_default(),
        container: container.to_string(),
    };
    let status = pod.status.as_ref().ok_or_else(not_found)?;
    let container_status = status
        .container_statuses
        .iter()
        .flatten()
        .find(|s| s.name == container)
        .ok_or_else(not_found)?;

    let run_state = container_status
        .state
        .as_ref()
        .map(RunState::from)
        .unwrap_or(RunState::Unknown);

    Ok(ObservedStatus::new(
        run_state,
        PodPhase::from_phase(status.phase.as_deref()),
    ))
}

impl From<&ContainerState> for RunState {
    fn from(state: &ContainerState) -> Self {
        if let Some(waiting) = &state.waiting {
            return RunState::Waiting {
                reason: waiting.reason.clone(),
                message: waiting.message.clone(),
            };
        }
        if state.running.is_some() {
            return RunState::Running;
        }
        if let Some(terminated) = &state.terminated {
            return RunState::Terminated {
                reason: terminated.reason.clone(),
                message: terminated.message.clone(),
                exit_code: terminated.exit_code,
            };
        }
        RunState::Unknown
    }
}
