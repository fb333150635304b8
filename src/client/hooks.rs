//! Session Hooks Module
//!
//! Boundary between the sync layer and the host application's session and
//! notification handling. The coordinator reads a bearer token and reports
//! failures; token refresh and presentation belong to the host.

// == Session Hooks ==
/// Callbacks injected by the host application.
pub trait SessionHooks: Send + Sync {
    /// Current bearer token, attached to every call when present.
    fn token(&self) -> Option<String> {
        None
    }

    /// Invoked once per classified authentication failure; the host is
    /// expected to tear down the session (logout, redirect).
    fn force_logout(&self) {}

    /// Invoked with a human-readable message for externally-surfaced
    /// failures. Identical messages within the notice window are already
    /// suppressed by the coordinator.
    fn notify_error(&self, _message: &str) {}
}

/// Hook implementation that ignores everything. Useful for tests and for
/// background consumers with no session or UI.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}
