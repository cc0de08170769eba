use super::error::K8sError;
use super::labels::DefaultLabels;
use crate::conformance::{PodPhase, RegistryFixture, RegistryProvisioner};
use crate::config::RegistryConfig;
use crate::context::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Node, Pod, PodSpec, Secret, SecretVolumeSource, Volume,
    VolumeMount,
};
use kube::api::{ListParams, PostParams};
use kube::core::ObjectMeta;
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const REGISTRY_NAME: &str = "private-registry";
const REGISTRY_COMPONENT: &str = "registry";
const HTPASSWD_KEY: &str = "htpasswd";
const AUTH_MOUNT_PATH: &str = "/auth";
const REGISTRY_STARTUP_INTERVAL: Duration = Duration::from_secs(2);

/// Runs a private, htpasswd protected registry as a pod in the test namespace.
pub struct K8sRegistryProvisioner {
    client: Client,
    namespace: String,
    config: RegistryConfig,
    ctx: Context,
}

impl K8sRegistryProvisioner {
    pub fn new(client: Client, namespace: &str, config: RegistryConfig, ctx: Context) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            config,
            ctx,
        }
    }

    async fn wait_running(&self, pods: &Api<Pod>) -> Result<Pod, K8sError> {
        let start = Instant::now();
        loop {
            let pod = self.ctx.run(pods.get(REGISTRY_NAME)).await??;
            let phase = PodPhase::from_phase(pod.status.as_ref().and_then(|s| s.phase.as_deref()));
            match phase {
                PodPhase::Running => return Ok(pod),
                PodPhase::Failed | PodPhase::Succeeded => {
                    return Err(K8sError::RegistryTerminated {
                        name: REGISTRY_NAME.to_string(),
                        phase: phase.to_string(),
                    })
                }
                PodPhase::Pending | PodPhase::Unknown => {}
            }
            if start.elapsed() >= self.config.startup_timeout {
                return Err(K8sError::RegistryNotReady(REGISTRY_NAME.to_string()));
            }
            debug!(phase = %phase, "waiting for the registry pod to run");
            self.ctx.sleep(REGISTRY_STARTUP_INTERVAL).await?;
        }
    }

    async fn schedulable_nodes(&self) -> Result<Vec<String>, K8sError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|node| {
                !node
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.unschedulable)
                    .unwrap_or(false)
            })
            .filter_map(|node| node.metadata.name)
            .collect())
    }
}

#[async_trait]
impl RegistryProvisioner for K8sRegistryProvisioner {
    async fn provision_registry_fixture(
        &self,
        needs_host_binding: bool,
    ) -> Result<RegistryFixture, K8sError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        create_or_reuse(&secrets, &htpasswd_secret(&self.config)).await?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        create_or_reuse(&pods, &registry_pod(&self.config, needs_host_binding)).await?;
        info!(image = %self.config.image, "private registry created, waiting for it to run");

        let pod = self.wait_running(&pods).await?;
        fixture_from_pod(&pod, self.config.port, needs_host_binding, || {
            self.schedulable_nodes()
        })
        .await
    }
}

/// Objects left by an earlier provisioning that failed halfway are picked up again.
async fn create_or_reuse<K>(api: &Api<K>, object: &K) -> Result<(), K8sError>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    match api
        .create(&PostParams::default(), object)
        .await
        .map_err(K8sError::from)
    {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => {
            debug!(name = REGISTRY_NAME, "reusing registry object from a previous provisioning");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn fixture_from_pod<F, Fut>(
    pod: &Pod,
    port: u16,
    needs_host_binding: bool,
    schedulable_nodes: F,
) -> Result<RegistryFixture, K8sError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<String>, K8sError>>,
{
    let not_scheduled = || K8sError::RegistryNotScheduled(REGISTRY_NAME.to_string());

    // With a host port the registry is only reachable as localhost from its own node.
    if needs_host_binding {
        let node = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .ok_or_else(not_scheduled)?;
        return Ok(RegistryFixture {
            address: format!("localhost:{port}"),
            eligible_nodes: vec![node],
        });
    }

    let pod_ip = pod
        .status
        .as_ref()
        .and_then(|status| status.pod_ip.clone())
        .ok_or_else(not_scheduled)?;
    Ok(RegistryFixture {
        address: format!("{pod_ip}:{port}"),
        eligible_nodes: schedulable_nodes().await?,
    })
}

fn htpasswd_secret(config: &RegistryConfig) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(REGISTRY_NAME.to_string()),
            labels: Some(DefaultLabels::new().with_component(REGISTRY_COMPONENT).get()),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(
            HTPASSWD_KEY.to_string(),
            config.htpasswd.clone(),
        )])),
        ..Default::default()
    }
}

fn registry_pod(config: &RegistryConfig, needs_host_binding: bool) -> Pod {
    let env = [
        ("REGISTRY_AUTH", "htpasswd".to_string()),
        ("REGISTRY_AUTH_HTPASSWD_REALM", "Registry Realm".to_string()),
        (
            "REGISTRY_AUTH_HTPASSWD_PATH",
            format!("{AUTH_MOUNT_PATH}/{HTPASSWD_KEY}"),
        ),
        ("REGISTRY_HTTP_ADDR", format!("0.0.0.0:{}", config.port)),
    ]
    .into_iter()
    .map(|(name, value)| EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    })
    .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(REGISTRY_NAME.to_string()),
            labels: Some(DefaultLabels::new().with_component(REGISTRY_COMPONENT).get()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: REGISTRY_NAME.to_string(),
                image: Some(config.image.clone()),
                env: Some(env),
                ports: Some(vec![ContainerPort {
                    container_port: i32::from(config.port),
                    host_port: needs_host_binding.then_some(i32::from(config.port)),
                    ..Default::default()
                }]),
                volume_mounts: Some(vec![VolumeMount {
                    name: HTPASSWD_KEY.to_string(),
                    mount_path: AUTH_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: HTPASSWD_KEY.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(REGISTRY_NAME.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
