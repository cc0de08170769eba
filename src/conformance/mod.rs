//! Verification that a workload scheduled on a node reaches an expected lifecycle state.
//!
//! Two bounded loops are nested: [`poll::poll_until_match`] polls the status of one workload
//! until it matches or a deadline elapses, and [`driver::FlakyRetryDriver`] repeats whole
//! attempts (create, poll, delete) to tolerate a flaky image registry.

pub mod attempt;
pub mod classifier;
pub mod driver;
pub mod error;
pub mod expectation;
pub mod poll;
pub mod prerequisites;
pub mod status;
pub mod workload;

pub use attempt::{AttemptOrchestrator, AttemptResult, AttemptRunner};
pub use classifier::{classify, Mismatch};
pub use driver::{FlakyRetryDriver, DEFAULT_MAX_ATTEMPTS};
pub use error::{AttemptError, FinalError, SetupError, WorkloadError};
pub use expectation::{Expectation, PodPhase};
pub use poll::{poll_until_match, PollConfig};
pub use prerequisites::{
    NoPrerequisites, Placement, Prerequisites, RegistryFixture, RegistryPrerequisites,
    RegistryProvisioner,
};
pub use status::{ObservedStatus, RunState};
pub use workload::{WorkloadClient, WorkloadHandle, WorkloadSpec};
