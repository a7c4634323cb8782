//! Internal Diesel row structs.
//!
//! Persistence detail only; never exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::schema::amenities;

/// Row read from `amenities`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = amenities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AmenityRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub amenity_type: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_builtin: bool,
    pub lifecycle_state: String,
    pub created_at: DateTime<Utc>,
    pub created_by_id: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by_id: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_id: Option<String>,
    pub extra: Value,
}

/// Insertable amenity.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = amenities)]
pub(crate) struct NewAmenityRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub slug: &'a str,
    pub amenity_type: &'a str,
    pub description: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub is_builtin: bool,
    pub lifecycle_state: &'a str,
    pub created_at: DateTime<Utc>,
    pub created_by_id: &'a str,
    pub updated_at: DateTime<Utc>,
    pub updated_by_id: &'a str,
    pub extra: Value,
}

/// Partial update; `None` columns are left untouched and `Some(None)` clears
/// a nullable column. `extra` is merged separately.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = amenities)]
pub(crate) struct AmenityChangeset<'a> {
    pub name: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub amenity_type: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub icon: Option<Option<&'a str>>,
    pub is_builtin: Option<bool>,
    pub updated_at: DateTime<Utc>,
    pub updated_by_id: &'a str,
}
