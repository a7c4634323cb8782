//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod actor_directory;
mod entity_repository;

#[cfg(test)]
pub use actor_directory::MockActorDirectory;
pub use actor_directory::{ActorDirectory, ActorDirectoryError, EmptyActorDirectory};
pub use entity_repository::{EntityRepository, EntityRepositoryError, SearchCriteria};
