//! Per-call deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{OrchestratorError, Result};

/// An absolute point in time by which a call must finish.
///
/// Each boundary call of a workflow runs under the same deadline. When it
/// elapses the in-flight call is dropped and the step fails with
/// [`OrchestratorError::DeadlineExceeded`]; earlier steps stay committed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Creates a deadline at an absolute instant.
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Time left before the deadline, zero if it has passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Returns true once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Fails if the deadline has already passed, so no new step starts late.
    pub fn check(&self, step: &'static str) -> Result<()> {
        if self.is_expired() {
            return Err(OrchestratorError::DeadlineExceeded { step });
        }
        Ok(())
    }

    /// Runs `fut` until it completes or the deadline passes.
    pub async fn run<F, T, E>(&self, step: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<OrchestratorError>,
    {
        self.check(step)?;
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                tracing::warn!(step, "deadline exceeded");
                Err(OrchestratorError::DeadlineExceeded { step })
            }
        }
    }
}
