pub mod error;

use crate::conformance::{Expectation, PodPhase, PollConfig, DEFAULT_MAX_ATTEMPTS};
use crate::credentials::RegistryCredentials;
use duration_str::deserialize_duration;
use error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_KUBELET_ROOT_DIR: &str = "/var/lib/kubelet";
const DEFAULT_NAMESPACE_PREFIX: &str = "runtime-conformance-";
const DEFAULT_REGISTRY_IMAGE: &str = "registry:2";
const DEFAULT_REGISTRY_PORT: u16 = 5000;
const DEFAULT_REGISTRY_STARTUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const PRIVATE_REGISTRY_CASE: &str =
    "should be able to pull from private registry with credential provider";
const PRIVATE_REGISTRY_IMAGE: &str = "pause:testing";

/// Settings of a conformance run, read from a yaml file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConformanceConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default)]
    pub poll: PollConfig,

    /// The credentials file for the kubelet is written here.
    #[serde(default = "default_kubelet_root_dir")]
    pub kubelet_root_dir: PathBuf,

    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Upper bound for the whole run. Unbounded when missing.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    #[serde(default = "default_cases")]
    pub cases: Vec<TestCase>,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll: PollConfig::default(),
            kubelet_root_dir: default_kubelet_root_dir(),
            namespace_prefix: default_namespace_prefix(),
            timeout: None,
            registry: None,
            cases: default_cases(),
        }
    }
}

impl ConformanceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.poll.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll.interval must be greater than zero".to_string(),
            ));
        }
        if self.cases.is_empty() {
            return Err(ConfigError::Invalid("no test cases".to_string()));
        }
        if let Some(case) = self
            .cases
            .iter()
            .find(|case| case.expectation.waiting && case.expectation.waiting_reasons.is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "test case `{}` expects a waiting container but lists no waiting_reasons",
                case.description
            )));
        }
        if self.needs_registry() && self.registry.is_none() {
            return Err(ConfigError::Invalid(
                "a test case sets up a private registry but `registry` is missing".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether any case pulls from the private registry.
    pub fn needs_registry(&self) -> bool {
        self.cases.iter().any(|case| case.setup_registry)
    }
}

/// The private registry fixture and the credentials the kubelet uses against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_image")]
    pub image: String,

    #[serde(default = "default_registry_port")]
    pub port: u16,

    /// Publish the registry on a host port so it is reachable as localhost from its node.
    #[serde(default = "default_host_binding")]
    pub host_binding: bool,

    #[serde(flatten)]
    pub credentials: RegistryCredentials,

    /// htpasswd entry matching `credentials`.
    pub htpasswd: String,

    #[serde(
        default = "default_registry_startup_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub startup_timeout: Duration,
}

/// A single verification: the image to run and the state it must reach.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestCase {
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub setup_registry: bool,
    #[serde(flatten)]
    pub expectation: Expectation,
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_kubelet_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_KUBELET_ROOT_DIR)
}

fn default_namespace_prefix() -> String {
    DEFAULT_NAMESPACE_PREFIX.to_string()
}

fn default_registry_image() -> String {
    DEFAULT_REGISTRY_IMAGE.to_string()
}

fn default_registry_port() -> u16 {
    DEFAULT_REGISTRY_PORT
}

fn default_host_binding() -> bool {
    true
}

fn default_registry_startup_timeout() -> Duration {
    DEFAULT_REGISTRY_STARTUP_TIMEOUT
}

fn default_cases() -> Vec<TestCase> {
    vec![TestCase {
        description: PRIVATE_REGISTRY_CASE.to_string(),
        image: PRIVATE_REGISTRY_IMAGE.to_string(),
        setup_registry: true,
        expectation: Expectation::running(PodPhase::Running),
    }]
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_duration")] Duration);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(duration)| duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
max_attempts: 5
poll:
  interval: 2s
  deadline: 1m
kubelet_root_dir: /tmp/kubelet
namespace_prefix: conformance-
timeout: 30m
registry:
  image: registry:2.8
  port: 5001
  host_binding: false
  username: user1
  password: user1password
  htpasswd: "user1:$2y$05$abcdefghijklmnopqrstuv"
  startup_timeout: 2m
cases:
  - description: private image
    image: pause:testing
    setup_registry: true
    phase: Running
  - description: image that does not exist
    image: invalid.example/nope:latest
    phase: Pending
    waiting: true
"#;

    #[test]
    fn test_full_config() {
        let config: ConformanceConfig = serde_yaml::from_str(FULL_CONFIG).unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll.interval, Duration::from_secs(2));
        assert_eq!(config.poll.deadline, Duration::from_secs(60));
        assert_eq!(config.kubelet_root_dir, PathBuf::from("/tmp/kubelet"));
        assert_eq!(config.namespace_prefix, "conformance-");
        assert_eq!(config.timeout, Some(Duration::from_secs(30 * 60)));

        let registry = config.registry.as_ref().unwrap();
        assert_eq!(registry.image, "registry:2.8");
        assert_eq!(registry.port, 5001);
        assert!(!registry.host_binding);
        assert_eq!(registry.credentials.username, "user1");
        assert_eq!(registry.credentials.password, "user1password");
        assert_eq!(registry.startup_timeout, Duration::from_secs(120));

        assert_eq!(config.cases.len(), 2);
        assert!(config.cases[0].setup_registry);
        assert_eq!(
            config.cases[0].expectation,
            Expectation::running(PodPhase::Running)
        );
        assert!(!config.cases[1].setup_registry);
        assert_eq!(
            config.cases[1].expectation,
            Expectation::waiting(PodPhase::Pending)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: ConformanceConfig = serde_yaml::from_str(
            r#"
registry:
  username: user1
  password: user1password
  htpasswd: "user1:hash"
"#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.kubelet_root_dir, PathBuf::from("/var/lib/kubelet"));
        assert_eq!(config.namespace_prefix, "runtime-conformance-");
        assert_eq!(config.timeout, None);

        let registry = config.registry.as_ref().unwrap();
        assert_eq!(registry.image, "registry:2");
        assert_eq!(registry.port, 5000);
        assert!(registry.host_binding);
        assert_eq!(registry.startup_timeout, Duration::from_secs(300));

        assert_eq!(config.cases.len(), 1);
        assert_eq!(config.cases[0].description, PRIVATE_REGISTRY_CASE);
        assert_eq!(config.cases[0].image, "pause:testing");
        assert!(config.cases[0].setup_registry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_max_attempts_is_invalid() {
        let config = ConformanceConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("max_attempts")
        );
    }

    #[test]
    fn test_registry_case_without_registry_is_invalid() {
        // the default case pulls from the private registry
        assert_matches!(
            ConformanceConfig::default().validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("registry")
        );
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config = ConformanceConfig {
            poll: PollConfig {
                interval: Duration::ZERO,
                deadline: Duration::from_secs(60),
            },
            ..Default::default()
        };
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("poll.interval")
        );
    }

    #[test]
    fn test_waiting_case_without_reasons_is_invalid() {
        let config: ConformanceConfig = serde_yaml::from_str(
            r#"
cases:
  - description: stuck pulling
    image: invalid.example/nope:latest
    phase: Pending
    waiting: true
    waiting_reasons: []
"#,
        )
        .unwrap();
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("stuck pulling") && msg.contains("waiting_reasons")
        );
    }

    #[test]
    fn test_empty_cases_is_invalid() {
        let config = ConformanceConfig {
            cases: vec![],
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = ConformanceConfig::load(file.path()).unwrap();
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_load_missing_file() {
        assert_matches!(
            ConformanceConfig::load(Path::new("/non/existent/config.yaml")),
            Err(ConfigError::IOError(_))
        );
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"max_attempts: [not, a, number]").unwrap();

        assert_matches!(
            ConformanceConfig::load(file.path()),
            Err(ConfigError::SerdeYamlError(_))
        );
    }
}
