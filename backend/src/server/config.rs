//! Server settings loaded via OrthoConfig and the resolved server config.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use hospitality_backend::domain::ports::ActorDirectory;
use hospitality_backend::outbound::persistence::DbPool;
use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Values read from CLI flags, `HOSPITALITY_*` variables and config files.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HOSPITALITY")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; amenities stay in memory when absent.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub pool_max_size: Option<u32>,
    /// JSON file of token fingerprints and actors.
    pub actors_file: Option<PathBuf>,
}

impl ServerSettings {
    /// Parse the bind address, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a malformed address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
    }

    /// Configured pool size or the default.
    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE)
    }
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) actors: Arc<dyn ActorDirectory>,
}

impl ServerConfig {
    /// Construct a server configuration without persistence.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, actors: Arc<dyn ActorDirectory>) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            actors,
        }
    }

    /// Attach a database connection pool; amenities then use PostgreSQL.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for server settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> ServerSettings {
        ServerSettings::load_from_iter([OsString::from("hospitality-server")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("HOSPITALITY_BIND_ADDR", None::<String>),
            ("HOSPITALITY_DATABASE_URL", None::<String>),
            ("HOSPITALITY_POOL_MAX_SIZE", None::<String>),
            ("HOSPITALITY_ACTORS_FILE", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("default address"),
            DEFAULT_BIND_ADDR.parse::<SocketAddr>().expect("literal")
        );
        assert_eq!(settings.pool_max_size(), DEFAULT_POOL_MAX_SIZE);
        assert!(settings.database_url.is_none());
        assert!(settings.actors_file.is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("HOSPITALITY_BIND_ADDR", Some("127.0.0.1:9090".to_owned())),
            (
                "HOSPITALITY_DATABASE_URL",
                Some("postgres://localhost/hospitality".to_owned()),
            ),
            ("HOSPITALITY_POOL_MAX_SIZE", Some("4".to_owned())),
            ("HOSPITALITY_ACTORS_FILE", Some("/etc/hospitality/actors.json".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("address"),
            "127.0.0.1:9090".parse::<SocketAddr>().expect("literal")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/hospitality")
        );
        assert_eq!(settings.pool_max_size(), 4);
        assert_eq!(
            settings.actors_file,
            Some(PathBuf::from("/etc/hospitality/actors.json"))
        );
    }

    #[rstest]
    fn malformed_bind_address_is_reported() {
        let _guard = lock_env([("HOSPITALITY_BIND_ADDR", Some("nowhere".to_owned()))]);
        assert!(load_from_empty_args().bind_addr().is_err());
    }
}
