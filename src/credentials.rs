use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// File name the kubelet reads docker registry credentials from, relative to its root directory.
pub const KUBELET_CREDENTIALS_FILE: &str = "config.json";
const CREDENTIALS_FILE_MODE: u32 = 0o644;

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("credential file io error: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("error serializing docker config: `{0}`")]
    SerdeJson(#[from] serde_json::Error),
}

/// User and password accepted by the private registry fixture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct DockerConfig<'a> {
    auths: BTreeMap<&'a str, DockerAuth<'a>>,
}

#[derive(Serialize)]
struct DockerAuth<'a> {
    username: &'a str,
    password: &'a str,
    auth: String,
}

/// Renders the docker `config.json` granting `credentials` access to the registry at `address`.
pub fn docker_config_json(
    address: &str,
    credentials: &RegistryCredentials,
) -> Result<String, CredentialsError> {
    let auth = STANDARD.encode(format!(
        "{}:{}",
        credentials.username, credentials.password
    ));
    let config = DockerConfig {
        auths: BTreeMap::from([(
            address,
            DockerAuth {
                username: &credentials.username,
                password: &credentials.password,
                auth,
            },
        )]),
    };
    Ok(serde_json::to_string(&config)?)
}

#[cfg_attr(test, mockall::automock)]
pub trait CredentialWriter: Send + Sync {
    fn write_credential_material(&self, path: &Path, bytes: &[u8]) -> Result<(), CredentialsError>;
    fn remove_credential_material(&self, path: &Path) -> Result<(), CredentialsError>;
}

/// Writes credentials to the local filesystem, readable by the node agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCredentialWriter;

impl CredentialWriter for FileCredentialWriter {
    fn write_credential_material(&self, path: &Path, bytes: &[u8]) -> Result<(), CredentialsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(CREDENTIALS_FILE_MODE))?;
        }
        Ok(())
    }

    fn remove_credential_material(&self, path: &Path) -> Result<(), CredentialsError> {
        Ok(fs::remove_file(path)?)
    }
}

/// Credential file that is removed when dropped.
pub struct CredentialFile<W: CredentialWriter> {
    writer: Arc<W>,
    path: PathBuf,
}

impl<W: CredentialWriter> CredentialFile<W> {
    pub fn write(writer: Arc<W>, path: PathBuf, bytes: &[u8]) -> Result<Self, CredentialsError> {
        writer.write_credential_material(&path, bytes)?;
        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<W: CredentialWriter> Drop for CredentialFile<W> {
    fn drop(&mut self) {
        match self.writer.remove_credential_material(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "credential file removed"),
            Err(err) => warn!(path = %self.path.display(), "removing credential file: {err}"),
        }
    }
}
