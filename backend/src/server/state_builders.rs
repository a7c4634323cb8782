//! Builders for HTTP state from the resolved server configuration.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::info;

use hospitality_backend::domain::amenity::AmenitySchema;
use hospitality_backend::domain::ports::EntityRepository;
use hospitality_backend::inbound::http::state::{HttpState, HttpStatePorts};
use hospitality_backend::outbound::InMemoryEntityRepository;
use hospitality_backend::outbound::persistence::DieselAmenityRepository;

use super::ServerConfig;

/// Amenities use PostgreSQL when a pool is configured, memory otherwise.
fn amenity_repository(config: &ServerConfig) -> Arc<dyn EntityRepository<AmenitySchema>> {
    match &config.db_pool {
        Some(pool) => {
            info!(entity = "amenity", "using PostgreSQL repository");
            Arc::new(DieselAmenityRepository::new(pool.clone()))
        }
        None => {
            info!(entity = "amenity", "using in-memory repository");
            Arc::new(InMemoryEntityRepository::new())
        }
    }
}

/// Assemble the shared HTTP state.
pub fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    web::Data::new(HttpState::new(HttpStatePorts {
        amenities: amenity_repository(config),
        destinations: Arc::new(InMemoryEntityRepository::new()),
        user_accounts: Arc::new(InMemoryEntityRepository::new()),
        actors: Arc::clone(&config.actors),
        clock,
    }))
}
