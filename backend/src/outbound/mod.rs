//! Outbound adapters implementing domain ports.
//!
//! - **memory**: in-process entity repositories for every entity
//! - **persistence**: PostgreSQL repositories using Diesel
//! - **actor_directory**: bearer token lookup from a fingerprint file
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business rules.

pub mod actor_directory;
pub mod memory;
pub mod persistence;

pub use actor_directory::{ActorDirectoryLoadError, StaticActorDirectory, token_fingerprint};
pub use memory::{InMemoryEntityRepository, MemoryBacked};
