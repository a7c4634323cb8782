//! Shared helpers for integration suites that need embedded PostgreSQL.
//!
//! Each suite gets a fresh temporary database on the process-wide cluster and
//! applies the embedded migrations before handing out a URL.

use std::time::Duration;

use hospitality_backend::outbound::persistence::run_migrations;
use pg_embedded_setup_unpriv::TemporaryDatabase;
use tokio::runtime::Runtime;

const SHARED_CLUSTER_RETRIES: usize = 5;
const SHARED_CLUSTER_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Returns true when `SKIP_TEST_CLUSTER` is `1`, `true` or `yes`.
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Skip when `SKIP_TEST_CLUSTER` is set; otherwise fail loudly.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// Create a migrated temporary database on the shared cluster.
pub fn migrated_database(runtime: &Runtime) -> Result<TemporaryDatabase, String> {
    let mut attempt = 1;
    let cluster = loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => break handle,
            Err(err) if attempt < SHARED_CLUSTER_RETRIES => {
                eprintln!("pg-embed: attempt {attempt} failed, retrying: {err}");
                std::thread::sleep(SHARED_CLUSTER_RETRY_DELAY);
                attempt += 1;
            }
            Err(err) => return Err(err.to_string()),
        }
    };
    let database = cluster
        .temporary_database(format!("test_{}", uuid::Uuid::new_v4()).as_str())
        .map_err(|err| format!("create temporary database: {err:?}"))?;
    let url = database.url().to_string();
    runtime
        .block_on(run_migrations(&url))
        .map_err(|err| err.to_string())?;
    Ok(database)
}
