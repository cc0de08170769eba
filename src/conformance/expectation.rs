use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Waiting reason reported by the kubelet when pulling the image failed.
pub const ERR_IMAGE_PULL: &str = "ErrImagePull";
/// Waiting reason reported by the kubelet while backing off between image pulls.
pub const ERR_IMAGE_PULL_BACK_OFF: &str = "ImagePullBackOff";

/// Lifecycle phase of a pod as reported by the platform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    /// Maps the phase string of a pod status. Missing or unrecognized phases are `Unknown`.
    pub fn from_phase(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the workload under test is expected to look like once it settles.
///
/// When `waiting` is false the container must be running. When it is true the container must be
/// waiting for one of the `waiting_reasons`. In both cases the pod must be in `phase`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Expectation {
    pub phase: PodPhase,
    #[serde(default)]
    pub waiting: bool,
    #[serde(default = "image_pull_reasons")]
    pub waiting_reasons: BTreeSet<String>,
}

impl Expectation {
    /// The container is expected to be running and the pod in `phase`.
    ///
    /// The waiting reasons are unused in that case but carry the same default a deserialized
    /// expectation gets, so both compare equal.
    pub fn running(phase: PodPhase) -> Self {
        Self {
            phase,
            waiting: false,
            waiting_reasons: image_pull_reasons(),
        }
    }

    /// The container is expected to be stuck pulling its image and the pod in `phase`.
    pub fn waiting(phase: PodPhase) -> Self {
        Self {
            phase,
            waiting: true,
            waiting_reasons: image_pull_reasons(),
        }
    }

    pub fn with_waiting_reasons<I, S>(mut self, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.waiting_reasons = reasons.into_iter().map(Into::into).collect();
        self
    }
}

fn image_pull_reasons() -> BTreeSet<String> {
    BTreeSet::from([
        ERR_IMAGE_PULL.to_string(),
        ERR_IMAGE_PULL_BACK_OFF.to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(Some("Pending"), PodPhase::Pending)]
    #[case::running(Some("Running"), PodPhase::Running)]
    #[case::succeeded(Some("Succeeded"), PodPhase::Succeeded)]
    #[case::failed(Some("Failed"), PodPhase::Failed)]
    #[case::unknown(Some("Unknown"), PodPhase::Unknown)]
    #[case::unrecognized(Some("Evicted"), PodPhase::Unknown)]
    #[case::missing(None, PodPhase::Unknown)]
    fn test_pod_phase_from_phase(#[case] phase: Option<&str>, #[case] expected: PodPhase) {
        assert_eq!(PodPhase::from_phase(phase), expected);
    }

    #[test]
    fn test_waiting_reasons_default_to_image_pull_failures() {
        let expectation: Expectation = serde_yaml::from_str(
            r#"
phase: Pending
waiting: true
"#,
        )
        .unwrap();

        assert_eq!(expectation, Expectation::waiting(PodPhase::Pending));
        assert!(expectation.waiting_reasons.contains(ERR_IMAGE_PULL));
        assert!(expectation.waiting_reasons.contains(ERR_IMAGE_PULL_BACK_OFF));
    }

    #[test]
    fn test_running_expectation_matches_deserialized_one() {
        let expectation: Expectation = serde_yaml::from_str("phase: Running").unwrap();

        assert_eq!(expectation, Expectation::running(PodPhase::Running));
        assert!(!expectation.waiting);
    }

    #[test]
    fn test_waiting_reasons_can_be_overridden() {
        let expectation: Expectation = serde_yaml::from_str(
            r#"
phase: Pending
waiting: true
waiting_reasons: [CreateContainerConfigError]
"#,
        )
        .unwrap();

        assert_eq!(
            expectation,
            Expectation::waiting(PodPhase::Pending)
                .with_waiting_reasons(["CreateContainerConfigError"])
        );
    }
}
