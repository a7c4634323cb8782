//! Backend entry-point: loads settings, wires repositories and serves HTTP.

mod server;

use std::sync::Arc;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use hospitality_backend::domain::ports::{ActorDirectory, EmptyActorDirectory};
use hospitality_backend::inbound::http::health::HealthState;
use hospitality_backend::outbound::StaticActorDirectory;
use hospitality_backend::outbound::persistence::{DbPool, PoolConfig, run_migrations};

use server::{ServerConfig, ServerSettings, create_server};

fn load_actor_directory(settings: &ServerSettings) -> std::io::Result<Arc<dyn ActorDirectory>> {
    match &settings.actors_file {
        Some(path) => {
            let directory = StaticActorDirectory::load(path).map_err(std::io::Error::other)?;
            Ok(Arc::new(directory))
        }
        None => {
            warn!("no actor directory configured; every request acts as the guest");
            Ok(Arc::new(EmptyActorDirectory))
        }
    }
}

async fn connect(settings: &ServerSettings, url: &str) -> std::io::Result<DbPool> {
    run_migrations(url)
        .await
        .map_err(|err| std::io::Error::other(err.into_message()))?;
    let pool = DbPool::new(PoolConfig::new(url).with_max_size(settings.pool_max_size()))
        .await
        .map_err(|err| std::io::Error::other(err.into_message()))?;
    info!(max_size = settings.pool_max_size(), "database pool ready");
    Ok(pool)
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load().map_err(|err| std::io::Error::other(err.to_string()))?;
    let bind_addr = settings
        .bind_addr()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    let mut config = ServerConfig::new(bind_addr, load_actor_directory(&settings)?);
    if let Some(url) = settings.database_url.as_deref() {
        config = config.with_db_pool(connect(&settings, url).await?);
    }

    let health_state = web::Data::new(HealthState::new());
    info!(%bind_addr, "starting server");
    create_server(health_state, config)?.await
}
