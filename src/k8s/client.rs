use super::error::K8sError;
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use tracing::debug;

/// Constructs a new Kubernetes client defaulting to `namespace`.
///
/// If loading from the inCluster config fail we fall back to kube-config.
/// This will respect the `$KUBECONFIG` envvar, but otherwise default to `~/.kube/config`.
pub async fn create_client(namespace: &str) -> Result<Client, K8sError> {
    debug!("trying inClusterConfig for k8s client");

    let mut config = match Config::incluster() {
        Ok(c) => c,
        Err(e) => {
            debug!("inClusterConfig failed {e}, trying kubeconfig for k8s client");
            Config::from_kubeconfig(&KubeConfigOptions::default()).await?
        }
    };
    config.default_namespace = namespace.to_string();

    let client = Client::try_from(config)?;
    debug!("client creation succeeded");
    Ok(client)
}
