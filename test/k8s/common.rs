use kube::Client;
use runtime_conformance::k8s::client::create_client;
use runtime_conformance::k8s::namespace::TestNamespace;

const TEST_NAMESPACE_PREFIX: &str = "runtime-conformance-test-";

/// Client for the cluster of the current kubeconfig and a namespace deleted when dropped.
pub struct K8sEnv {
    pub client: Client,
    pub namespace: TestNamespace,
}

impl K8sEnv {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let client = create_client("default").await?;
        let namespace = TestNamespace::create(client.clone(), TEST_NAMESPACE_PREFIX).await?;
        Ok(K8sEnv { client, namespace })
    }

    pub fn namespace(&self) -> &str {
        self.namespace.name()
    }
}
