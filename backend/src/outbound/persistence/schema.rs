//! Diesel table definitions.
//!
//! Must match `backend/migrations` exactly; regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Amenity catalogue.
    ///
    /// `slug` carries a unique index. Enumerations are stored as their
    /// SCREAMING_SNAKE_CASE wire names. `extra` holds undeclared payload keys
    /// as a JSON object.
    amenities (id) {
        id -> Uuid,
        name -> Varchar,
        slug -> Varchar,
        amenity_type -> Varchar,
        description -> Nullable<Text>,
        icon -> Nullable<Varchar>,
        is_builtin -> Bool,
        lifecycle_state -> Varchar,
        created_at -> Timestamptz,
        created_by_id -> Varchar,
        updated_at -> Timestamptz,
        updated_by_id -> Varchar,
        deleted_at -> Nullable<Timestamptz>,
        deleted_by_id -> Nullable<Varchar>,
        extra -> Jsonb,
    }
}
