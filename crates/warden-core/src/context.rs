//! Cancellation and deadline context threaded through every collaborator call.
//!
//! The connectors never inspect the context themselves; they hand it to the
//! vault and database, which report `Cancelled` errors that the connectors
//! propagate unchanged.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use warden_errors::Error;
use warden_errors::Result;

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled on its own.
    pub fn background() -> Self {
        Self::default()
    }

    /// Child context that is also cancelled when `timeout` elapses.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context with a deadline no later than the parent's.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Child context cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Cancelled` once the context is cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::cancelled("context cancelled"));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Error::cancelled("context deadline exceeded"));
        }
        Ok(())
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
