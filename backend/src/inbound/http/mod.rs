//! HTTP inbound adapter exposing REST endpoints.

pub mod auth;
pub mod entity_routes;
pub mod envelope;
pub mod error;
pub mod health;
pub mod state;

pub use error::ApiResult;
