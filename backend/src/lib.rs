//! Hospitality backend: generic entity services behind an HTTP adapter.
//!
//! - [`domain`] holds entities, the service pipeline and its ports.
//! - [`inbound`] maps HTTP requests onto services.
//! - [`outbound`] implements the ports (in-memory, PostgreSQL, actor files).

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
