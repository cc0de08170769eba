use super::error::WorkloadError;
use super::prerequisites::Placement;
use super::status::ObservedStatus;
use async_trait::async_trait;

/// Declarative description of the single-container pod created on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: String,
    pub image: String,
    pub node_name: Option<String>,
}

impl WorkloadSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            node_name: None,
        }
    }

    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    /// Returns the spec to create once prerequisites are in place: the image is pulled from the
    /// provisioned registry and the pod is pinned to the provisioned node, if any.
    pub fn placed(&self, placement: &Placement) -> Self {
        let image = match &placement.registry_address {
            Some(address) => format!("{address}/{}", self.image),
            None => self.image.clone(),
        };
        Self {
            name: self.name.clone(),
            image,
            node_name: placement
                .node_name
                .clone()
                .or_else(|| self.node_name.clone()),
        }
    }
}

/// Identifies a created workload. Owned by exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadHandle {
    pub pod_name: String,
    pub container_name: String,
    pub namespace: String,
    pub node_name: Option<String>,
}

/// Platform operations needed to drive a workload through an attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadHandle, WorkloadError>;

    async fn get_workload_status(
        &self,
        handle: &WorkloadHandle,
    ) -> Result<ObservedStatus, WorkloadError>;

    async fn delete_workload(&self, handle: &WorkloadHandle) -> Result<(), WorkloadError>;
}
