//! Host-facing side channel for notifications and navigation.
//!
//! The pipeline never performs UI work itself. Failures that call for user
//! attention surface here as explicit events; hosts decide what a
//! notification or a navigation actually looks like.

use async_trait::async_trait;

/// Weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational
    Info,
    /// Something degraded but recoverable
    Warning,
    /// A failure the user should see
    Error,
}

/// Where a reaction asks the host to take the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationHint {
    /// Credential rejected, re-authentication needed
    Login,
    /// The requested resource does not exist
    NotFound,
}

/// Observer for pipeline side effects.
#[async_trait]
pub trait ClientEvents: Send + Sync {
    /// A message for the user, with its severity.
    async fn notify(&self, _message: &str, _severity: Severity) {}

    /// A request to move the user somewhere, optionally carrying the path to
    /// return to afterwards.
    async fn navigate(&self, _hint: NavigationHint, _return_to: Option<&str>) {}
}

/// Events observer that ignores everything.
pub struct NoopEvents;

#[async_trait]
impl ClientEvents for NoopEvents {}

/// Events observer that logs through `tracing`.
pub struct TracingEvents;

#[async_trait]
impl ClientEvents for TracingEvents {
    async fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(message, "notification"),
            Severity::Warning => tracing::warn!(message, "notification"),
            Severity::Error => tracing::error!(message, "notification"),
        }
    }

    async fn navigate(&self, hint: NavigationHint, return_to: Option<&str>) {
        tracing::info!(?hint, return_to, "navigation requested");
    }
}
