use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("the verification run was cancelled")]
pub struct Cancelled;

/// Cancellation signal shared by everything taking part in a verification run.
///
/// Cloning a [`Context`] gives another handle to the same signal. Once [`Context::cancel_all`] is
/// called every pending [`Context::run`] or [`Context::sleep`] returns [`Cancelled`], and so does
/// every later one.
#[derive(Debug, Clone)]
pub struct Context {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Context {
    fn default() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation signal, waking up every task waiting on this context.
    pub fn cancel_all(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone of the context, so `changed` cannot fail here.
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drives `fut` to completion unless the context gets cancelled first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Cancelled>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Sleeps for `duration`, returning early with [`Cancelled`] if the context is cancelled.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.run(tokio::time::sleep(duration)).await
    }
}
