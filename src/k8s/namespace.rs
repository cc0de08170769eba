use super::error::K8sError;
use super::labels::DefaultLabels;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{DeleteParams, PostParams};
use kube::core::ObjectMeta;
use kube::{Api, Client};
use tracing::{debug, warn};

/// Pods using host ports need the privileged pod security level.
const POD_SECURITY_ENFORCE_KEY: &str = "pod-security.kubernetes.io/enforce";
const POD_SECURITY_PRIVILEGED: &str = "privileged";

/// Namespace generated for a conformance run. It is deleted, together with every workload and
/// fixture in it, when dropped.
pub struct TestNamespace {
    client: Client,
    name: String,
}

impl TestNamespace {
    pub async fn create(client: Client, prefix: &str) -> Result<Self, K8sError> {
        let mut labels = DefaultLabels::new().get();
        labels.insert(
            POD_SECURITY_ENFORCE_KEY.to_string(),
            POD_SECURITY_PRIVILEGED.to_string(),
        );
        let namespace = Namespace {
            metadata: ObjectMeta {
                generate_name: Some(prefix.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };

        let namespaces: Api<Namespace> = Api::all(client.clone());
        let created = namespaces
            .create(&PostParams::default(), &namespace)
            .await?;
        let name = created
            .metadata
            .name
            .ok_or_else(|| K8sError::MissingName("namespace".to_string()))?;
        debug!(namespace = %name, "test namespace created");

        Ok(Self { client, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn clean_up(&self) {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces
            .delete(&self.name, &DeleteParams::default())
            .await
        {
            Ok(_) => debug!(namespace = %self.name, "test namespace deleted"),
            Err(err) => warn!(namespace = %self.name, "deleting test namespace: {err}"),
        }
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        // Async drop doesn't exist, this blocks the current thread so it needs a multi thread runtime.
        futures::executor::block_on(self.clean_up());
    }
}
