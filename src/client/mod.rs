//! Client Module
//!
//! The request coordinator and its collaborators: request identity, the
//! transport seam, session hooks and performance metrics.

mod coordinator;
mod hooks;
mod key;
mod metrics;
mod transport;

// Re-export public types
pub use coordinator::{ApiClient, RequestOptions};
pub use hooks::{NoopHooks, SessionHooks};
pub use key::RequestKey;
pub use metrics::RequestMetrics;
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
