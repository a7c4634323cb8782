//! Shared helpers for Diesel entity repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::EntityRepositoryError;

use super::pool::PoolError;

/// Map pool failures to connection errors.
pub fn map_pool_error(error: PoolError) -> EntityRepositoryError {
    EntityRepositoryError::connection(error.into_message())
}

/// Map Diesel failures to repository errors.
///
/// Unique violations become [`EntityRepositoryError::Duplicate`] carrying the
/// constraint name; the service replaces it with a generic message.
pub fn map_diesel_error(error: DieselError) -> EntityRepositoryError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => EntityRepositoryError::query("record not found"),
        DieselError::QueryBuilderError(_) => EntityRepositoryError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            EntityRepositoryError::duplicate(
                info.constraint_name()
                    .unwrap_or("unique constraint")
                    .to_owned(),
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            EntityRepositoryError::connection("database connection error")
        }
        _ => EntityRepositoryError::query("database error"),
    }
}

/// Escape `LIKE` metacharacters so user text matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `%text%` pattern for case-insensitive containment.
pub fn contains_pattern(raw: &str) -> String {
    format!("%{}%", escape_like(raw))
}

/// Clamp a window bound to PostgreSQL's `BIGINT`.
pub fn to_db_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a non-negative count from PostgreSQL.
pub fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
