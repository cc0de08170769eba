use super::expectation::{Expectation, PodPhase};
use super::status::{ObservedStatus, RunState};
use thiserror::Error;

/// Reason why an observed status does not satisfy an [`Expectation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    #[error("expected container state: {expected}, got: \"{got}\"")]
    ContainerState {
        expected: &'static str,
        got: &'static str,
    },

    #[error("unexpected waiting reason: \"{0}\"")]
    WaitingReason(String),

    #[error("expected pod phase: \"{expected}\", got: \"{got}\"")]
    PodPhase { expected: PodPhase, got: PodPhase },
}

/// Checks `observed` against `expectation`.
///
/// The container state is checked before the pod phase. Pods sit in `Pending` by default, so
/// checking the phase first would let a `Pending` expectation pass before the container status
/// is even reported. The first failing check is the one returned.
pub fn classify(observed: &ObservedStatus, expectation: &Expectation) -> Result<(), Mismatch> {
    if expectation.waiting {
        let RunState::Waiting { reason, .. } = &observed.run_state else {
            return Err(Mismatch::ContainerState {
                expected: "Waiting",
                got: observed.run_state.name(),
            });
        };
        let reason = reason.as_deref().unwrap_or_default();
        if !expectation.waiting_reasons.contains(reason) {
            return Err(Mismatch::WaitingReason(reason.to_string()));
        }
    } else if observed.run_state != RunState::Running {
        return Err(Mismatch::ContainerState {
            expected: "Running",
            got: observed.run_state.name(),
        });
    }

    if observed.pod_phase != expectation.phase {
        return Err(Mismatch::PodPhase {
            expected: expectation.phase,
            got: observed.pod_phase,
        });
    }

    Ok(())
}
