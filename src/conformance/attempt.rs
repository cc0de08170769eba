use super::error::AttemptError;
use super::expectation::Expectation;
use super::poll::{poll_until_match, PollConfig};
use super::prerequisites::Prerequisites;
use super::workload::{WorkloadClient, WorkloadHandle, WorkloadSpec};
use crate::context::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Verdict of a single create, poll and delete cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    /// Human readable description of what was observed compared to what was expected.
    Failure(String),
}

/// Runs one attempt of a verification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run_attempt(
        &self,
        template: &WorkloadSpec,
        expectation: &crate::conformance::expectation::Expectation,
    ) -> Result<AttemptResult, AttemptError>;
}

/// Drives a workload through an attempt: provision, create, poll and always delete.
pub struct AttemptOrchestrator<C, P>
where
    C: WorkloadClient + 'static,
    P: Prerequisites,
{
    client: Arc<C>,
    prerequisites: P,
    poll_config: PollConfig,
    ctx: Context,
}

impl<C, P> AttemptOrchestrator<C, P>
where
    C: WorkloadClient + 'static,
    P: Prerequisites,
{
    pub fn new(client: Arc<C>, prerequisites: P, ctx: Context) -> Self {
        Self {
            client,
            prerequisites,
            poll_config: PollConfig::default(),
            ctx,
        }
    }

    pub fn with_poll_config(mut self, poll_config: PollConfig) -> Self {
        self.poll_config = poll_config;
        self
    }
}

#[async_trait]
impl<C, P> AttemptRunner for AttemptOrchestrator<C, P>
where
    C: WorkloadClient + 'static,
    P: Prerequisites,
{
    async fn run_attempt(
        &self,
        template: &WorkloadSpec,
        expectation: &Expectation,
    ) -> Result<AttemptResult, AttemptError> {
        let placement = self.ctx.run(self.prerequisites.provision()).await??;
        let spec = template.placed(&placement);

        info!(workload = %spec.name, image = %spec.image, "create the container");
        let handle = match self.ctx.run(self.client.create_workload(&spec)).await? {
            Ok(handle) => handle,
            Err(err) => {
                return Ok(AttemptResult::Failure(format!(
                    "failed to create workload `{}`: {err}",
                    spec.name
                )))
            }
        };
        let workload = WorkloadGuard::new(self.client.clone(), handle);

        info!(workload = %spec.name, "check the container status");
        let polled = poll_until_match(&self.ctx, expectation, &self.poll_config, || {
            self.client.get_workload_status(workload.handle())
        })
        .await;

        info!(workload = %spec.name, "delete the container");
        workload.release().await;

        Ok(polled?)
    }
}

/// Owns the workload of an attempt and makes sure it is deleted exactly once.
///
/// [`WorkloadGuard::release`] deletes it on the regular path. If the guard is dropped before
/// that (the attempt future was dropped or panicked) the deletion is spawned on the current
/// runtime instead.
struct WorkloadGuard<C: WorkloadClient + 'static> {
    client: Arc<C>,
    handle: WorkloadHandle,
    released: bool,
}

impl<C: WorkloadClient + 'static> WorkloadGuard<C> {
    fn new(client: Arc<C>, handle: WorkloadHandle) -> Self {
        Self {
            client,
            handle,
            released: false,
        }
    }

    fn handle(&self) -> &WorkloadHandle {
        &self.handle
    }

    async fn release(mut self) {
        self.released = true;
        delete_best_effort(self.client.as_ref(), &self.handle).await;
    }
}

impl<C: WorkloadClient + 'static> Drop for WorkloadGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(pod = %self.handle.pod_name, "no runtime available to delete the workload");
            return;
        };
        let client = self.client.clone();
        let handle = self.handle.clone();
        runtime.spawn(async move { delete_best_effort(client.as_ref(), &handle).await });
    }
}

/// Deletion errors must not hide the verification result, so they are only logged.
async fn delete_best_effort<C: WorkloadClient + ?Sized>(client: &C, handle: &WorkloadHandle) {
    match client.delete_workload(handle).await {
        Ok(()) => debug!(pod = %handle.pod_name, "workload deleted"),
        Err(err) => warn!(pod = %handle.pod_name, "failed to delete workload: {err}"),
    }
}
