//! Health-check contract shared by every probe.

use std::fmt;
use std::future::Future;

use mailprobe_transport::CancellationToken;

use crate::Error;

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    /// The dependency failed the check.
    #[default]
    Unhealthy,
    /// The dependency works with reduced capability.
    Degraded,
    /// The dependency passed the check.
    Healthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unhealthy => "Unhealthy",
            Self::Degraded => "Degraded",
            Self::Healthy => "Healthy",
        })
    }
}

/// Result of one health-check invocation.
#[derive(Debug)]
pub struct HealthCheckResult {
    /// Reported status.
    pub status: HealthStatus,
    /// Human-readable reason, set for negative protocol outcomes.
    pub description: Option<String>,
    /// Underlying error, set when the check was aborted by one.
    pub error: Option<Error>,
}

impl HealthCheckResult {
    /// A passing result.
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            description: None,
            error: None,
        }
    }

    /// A failing result with a description.
    #[must_use]
    pub fn failure(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: Some(description.into()),
            error: None,
        }
    }

    /// A failing result caused by `error`.
    #[must_use]
    pub fn from_error(status: HealthStatus, error: impl Into<Error>) -> Self {
        let error = error.into();
        Self {
            status,
            description: Some(error.to_string()),
            error: Some(error),
        }
    }

    /// Returns true if the status is [`HealthStatus::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Per-registration settings handed to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckContext {
    /// Registration name, used in logs.
    pub name: String,
    /// Status reported for every failure.
    pub failure_status: HealthStatus,
}

impl HealthCheckContext {
    /// Creates a context that reports failures as [`HealthStatus::Unhealthy`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_status: HealthStatus::Unhealthy,
        }
    }

    /// Overrides the failure status.
    #[must_use]
    pub const fn with_failure_status(mut self, status: HealthStatus) -> Self {
        self.failure_status = status;
        self
    }
}

/// A dependency probe.
pub trait HealthCheck {
    /// Runs the probe once. Never panics; every failure becomes a result.
    fn check_health(
        &self,
        context: &HealthCheckContext,
        cancel: CancellationToken,
    ) -> impl Future<Output = HealthCheckResult> + Send;
}
