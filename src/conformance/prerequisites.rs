use super::error::SetupError;
use crate::credentials::{docker_config_json, CredentialFile, CredentialWriter, RegistryCredentials};
use crate::k8s::error::K8sError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Where and from which registry the workload of an attempt runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub registry_address: Option<String>,
    pub node_name: Option<String>,
}

/// A running private registry the workload image can be pulled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFixture {
    pub address: String,
    pub eligible_nodes: Vec<String>,
}

/// Everything that has to be in place before the workload of an attempt is created.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prerequisites: Send + Sync {
    async fn provision(&self) -> Result<Placement, SetupError>;
}

/// Starts a private registry reachable from (some of) the cluster nodes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryProvisioner: Send + Sync {
    async fn provision_registry_fixture(
        &self,
        needs_host_binding: bool,
    ) -> Result<RegistryFixture, K8sError>;
}

/// Prerequisites for workloads pulling public images on any node.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrerequisites;

#[async_trait]
impl Prerequisites for NoPrerequisites {
    async fn provision(&self) -> Result<Placement, SetupError> {
        Ok(Placement::default())
    }
}

/// Provisions a private registry and the node credentials needed to pull from it.
///
/// Both are provisioned on the first successful call and reused by every later attempt of the
/// run. The credential file is removed when this value is dropped.
pub struct RegistryPrerequisites<R, W>
where
    R: RegistryProvisioner,
    W: CredentialWriter + 'static,
{
    provisioner: R,
    writer: Arc<W>,
    credentials: RegistryCredentials,
    credential_path: PathBuf,
    needs_host_binding: bool,
    provisioned: OnceCell<(Placement, CredentialFile<W>)>,
}

impl<R, W> RegistryPrerequisites<R, W>
where
    R: RegistryProvisioner,
    W: CredentialWriter + 'static,
{
    pub fn new(
        provisioner: R,
        writer: Arc<W>,
        credentials: RegistryCredentials,
        credential_path: PathBuf,
    ) -> Self {
        Self {
            provisioner,
            writer,
            credentials,
            credential_path,
            needs_host_binding: true,
            provisioned: OnceCell::new(),
        }
    }

    pub fn with_host_binding(mut self, needs_host_binding: bool) -> Self {
        self.needs_host_binding = needs_host_binding;
        self
    }

    async fn provision_once(&self) -> Result<(Placement, CredentialFile<W>), SetupError> {
        let fixture = self
            .provisioner
            .provision_registry_fixture(self.needs_host_binding)
            .await?;
        let node_name = fixture
            .eligible_nodes
            .first()
            .cloned()
            .ok_or(SetupError::NoEligibleNodes)?;
        debug!(
            address = %fixture.address,
            node = %node_name,
            "registry fixture ready"
        );

        let material = docker_config_json(&fixture.address, &self.credentials)?;
        let credential_file = CredentialFile::write(
            self.writer.clone(),
            self.credential_path.clone(),
            material.as_bytes(),
        )?;
        info!(
            path = %self.credential_path.display(),
            "registry credentials written for the node agent"
        );

        let placement = Placement {
            registry_address: Some(fixture.address),
            node_name: Some(node_name),
        };
        Ok((placement, credential_file))
    }
}

#[async_trait]
impl<R, W> Prerequisites for RegistryPrerequisites<R, W>
where
    R: RegistryProvisioner,
    W: CredentialWriter + 'static,
{
    async fn provision(&self) -> Result<Placement, SetupError> {
        let (placement, _) = self
            .provisioned
            .get_or_try_init(|| self.provision_once())
            .await?;
        Ok(placement.clone())
    }
}

#[async_trait]
impl<T> Prerequisites for Arc<T>
where
    T: Prerequisites + ?Sized,
{
    async fn provision(&self) -> Result<Placement, SetupError> {
        (**self).provision().await
    }
}
