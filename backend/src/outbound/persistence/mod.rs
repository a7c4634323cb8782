//! PostgreSQL persistence adapters using Diesel.
//!
//! Repositories only translate between Diesel rows and domain types. Row
//! structs (`models.rs`) and table definitions (`schema.rs`) stay private to
//! this module. Connections come from a `bb8` pool over `diesel-async`.
//!
//! # Example
//!
//! ```ignore
//! use hospitality_backend::outbound::persistence::{
//!     DbPool, DieselAmenityRepository, PoolConfig, run_migrations,
//! };
//!
//! run_migrations("postgres://localhost/hospitality").await?;
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/hospitality")).await?;
//! let amenities = DieselAmenityRepository::new(pool);
//! ```

mod diesel_amenity_repository;
mod diesel_helpers;
mod models;
mod pool;
mod schema;

pub use diesel_amenity_repository::DieselAmenityRepository;
pub use pool::{DbPool, PoolConfig, PoolError, run_migrations};
