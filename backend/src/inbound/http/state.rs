//! Shared HTTP adapter state.
//!
//! Handlers receive this state via `actix_web::web::Data` and depend only on
//! entity services and domain ports, so they stay testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::amenity::{AmenitySchema, amenity_config};
use crate::domain::destination::{DestinationSchema, destination_config};
use crate::domain::ports::{ActorDirectory, EntityRepository};
use crate::domain::user_account::{UserAccountSchema, user_account_config};
use crate::domain::{EntitySchema, EntityService};

/// Repositories and collaborators the HTTP state is assembled from.
#[derive(Clone)]
pub struct HttpStatePorts {
    /// Amenity storage.
    pub amenities: Arc<dyn EntityRepository<AmenitySchema>>,
    /// Destination storage.
    pub destinations: Arc<dyn EntityRepository<DestinationSchema>>,
    /// User account storage.
    pub user_accounts: Arc<dyn EntityRepository<UserAccountSchema>>,
    /// Token lookup.
    pub actors: Arc<dyn ActorDirectory>,
    /// Clock shared by the pipelines and response metadata.
    pub clock: Arc<dyn Clock>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Amenity catalogue.
    pub amenities: Arc<EntityService<AmenitySchema>>,
    /// Destination directory.
    pub destinations: Arc<EntityService<DestinationSchema>>,
    /// User accounts.
    pub user_accounts: Arc<EntityService<UserAccountSchema>>,
    /// Resolves bearer tokens to actors.
    pub actors: Arc<dyn ActorDirectory>,
    /// Source of response timestamps.
    pub clock: Arc<dyn Clock>,
}

impl From<HttpStatePorts> for HttpState {
    fn from(ports: HttpStatePorts) -> Self {
        Self::new(ports)
    }
}

impl HttpState {
    /// Wire one entity service per repository.
    #[must_use]
    pub fn new(ports: HttpStatePorts) -> Self {
        let HttpStatePorts {
            amenities,
            destinations,
            user_accounts,
            actors,
            clock,
        } = ports;
        Self {
            amenities: Arc::new(EntityService::new(
                amenity_config(amenities),
                Arc::clone(&clock),
            )),
            destinations: Arc::new(EntityService::new(
                destination_config(destinations),
                Arc::clone(&clock),
            )),
            user_accounts: Arc::new(EntityService::new(
                user_account_config(user_accounts),
                Arc::clone(&clock),
            )),
            actors,
            clock,
        }
    }
}

/// Selects the service for one entity so route handlers can stay generic.
pub trait ServiceRegistry<S: EntitySchema> {
    /// Service handling `S`.
    fn service(&self) -> &EntityService<S>;
}

impl ServiceRegistry<AmenitySchema> for HttpState {
    fn service(&self) -> &EntityService<AmenitySchema> {
        &self.amenities
    }
}

impl ServiceRegistry<DestinationSchema> for HttpState {
    fn service(&self) -> &EntityService<DestinationSchema> {
        &self.destinations
    }
}

impl ServiceRegistry<UserAccountSchema> for HttpState {
    fn service(&self) -> &EntityService<UserAccountSchema> {
        &self.user_accounts
    }
}
