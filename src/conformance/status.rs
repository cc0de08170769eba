use super::expectation::PodPhase;
use std::fmt;

/// Run-state of the container under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Waiting {
        reason: Option<String>,
        message: Option<String>,
    },
    Terminated {
        reason: Option<String>,
        message: Option<String>,
        exit_code: i32,
    },
    Unknown,
}

impl RunState {
    pub fn waiting(reason: impl Into<String>) -> Self {
        RunState::Waiting {
            reason: Some(reason.into()),
            message: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Running => "Running",
            RunState::Waiting { .. } => "Waiting",
            RunState::Terminated { .. } => "Terminated",
            RunState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the workload status taken on a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedStatus {
    pub run_state: RunState,
    pub pod_phase: PodPhase,
}

impl ObservedStatus {
    pub fn new(run_state: RunState, pod_phase: PodPhase) -> Self {
        Self {
            run_state,
            pod_phase,
        }
    }
}
