//! PostgreSQL-backed amenity repository.
//!
//! Free-text search uses `ILIKE` over name, slug and description. The unique
//! index on `slug` is authoritative; violations surface as `Duplicate`.
//! Undeclared payload keys live in the `extra` JSONB object; updates merge
//! into it with `||`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::expression_methods::PgJsonbExpressionMethods;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::{Page, PageRequest};
use serde_json::Value;

use crate::domain::amenity::{Amenity, AmenityFilters, AmenityPatch, AmenitySchema, AmenityType, NewAmenity};
use crate::domain::ports::{EntityRepository, EntityRepositoryError, SearchCriteria};
use crate::domain::{
    ActorId, AuditFields, AuditStamp, EntityId, ExtraFields, LifecycleState, NewEntity,
};

use super::diesel_helpers::{
    contains_pattern, from_db_count, map_diesel_error, map_pool_error, to_db_bound,
};
use super::models::{AmenityChangeset, AmenityRow, NewAmenityRow};
use super::pool::DbPool;
use super::schema::amenities;

/// Diesel implementation of the amenity repository port.
#[derive(Clone)]
pub struct DieselAmenityRepository {
    pool: DbPool,
}

impl DieselAmenityRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> EntityRepositoryError {
    EntityRepositoryError::query(format!("invalid {column} in database: {err}"))
}

fn row_to_amenity(row: AmenityRow) -> Result<Amenity, EntityRepositoryError> {
    let amenity_type =
        AmenityType::from_str(&row.amenity_type).map_err(|err| corrupt("amenity_type", err))?;
    let lifecycle_state = LifecycleState::from_str(&row.lifecycle_state)
        .map_err(|err| corrupt("lifecycle_state", err))?;
    let actor = |column: &str, raw: String| ActorId::new(raw).map_err(|err| corrupt(column, err));
    let deleted_by_id = row
        .deleted_by_id
        .map(|raw| actor("deleted_by_id", raw))
        .transpose()?;
    let extra: ExtraFields = match row.extra {
        Value::Object(map) => map,
        other => return Err(corrupt("extra", format!("expected an object, got {other}"))),
    };

    Ok(Amenity {
        id: EntityId::from_uuid(row.id),
        name: row.name,
        slug: row.slug,
        amenity_type,
        description: row.description,
        icon: row.icon,
        is_builtin: row.is_builtin,
        lifecycle_state,
        audit: AuditFields {
            created_at: row.created_at,
            created_by_id: actor("created_by_id", row.created_by_id)?,
            updated_at: row.updated_at,
            updated_by_id: actor("updated_by_id", row.updated_by_id)?,
            deleted_at: row.deleted_at,
            deleted_by_id,
        },
        extra,
    })
}

fn rows_to_amenities(rows: Vec<AmenityRow>) -> Result<Vec<Amenity>, EntityRepositoryError> {
    rows.into_iter().map(row_to_amenity).collect()
}

/// Base query restricted to the lifecycle state, text query and filters.
fn matching(criteria: &SearchCriteria<AmenityFilters>) -> amenities::BoxedQuery<'static, Pg> {
    let mut query = amenities::table
        .filter(amenities::lifecycle_state.eq(criteria.effective_lifecycle_state().as_str()))
        .into_boxed();

    if let Some(q) = criteria.q.as_deref() {
        let pattern = contains_pattern(q);
        query = query.filter(
            amenities::name
                .ilike(pattern.clone())
                .or(amenities::slug.ilike(pattern.clone()))
                .or(amenities::description.ilike(pattern)),
        );
    }
    if let Some(amenity_type) = criteria.filters.amenity_type {
        query = query.filter(amenities::amenity_type.eq(amenity_type.as_str()));
    }
    if let Some(is_builtin) = criteria.filters.is_builtin {
        query = query.filter(amenities::is_builtin.eq(is_builtin));
    }
    query
}

#[async_trait]
impl EntityRepository<AmenitySchema> for DieselAmenityRepository {
    async fn create(&self, new: NewEntity<NewAmenity>) -> Result<Amenity, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let NewEntity { record, stamp } = new;
        let row = NewAmenityRow {
            id: *EntityId::random().as_uuid(),
            name: &record.name,
            slug: &record.slug,
            amenity_type: record.amenity_type.as_str(),
            description: record.description.as_deref(),
            icon: record.icon.as_deref(),
            is_builtin: record.is_builtin,
            lifecycle_state: LifecycleState::Active.as_str(),
            created_at: stamp.at,
            created_by_id: stamp.actor_id.as_str(),
            updated_at: stamp.at,
            updated_by_id: stamp.actor_id.as_str(),
            extra: Value::Object(record.extra),
        };

        let inserted: AmenityRow = diesel::insert_into(amenities::table)
            .values(row)
            .returning(AmenityRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_amenity(inserted)
    }

    async fn update(
        &self,
        id: EntityId,
        patch: AmenityPatch,
        stamp: AuditStamp,
    ) -> Result<Amenity, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = AmenityChangeset {
            name: patch.name.as_deref(),
            slug: patch.slug.as_deref(),
            amenity_type: patch.amenity_type.map(AmenityType::as_str),
            description: patch.description.as_ref().map(Option::as_deref),
            icon: patch.icon.as_ref().map(Option::as_deref),
            is_builtin: patch.is_builtin,
            updated_at: stamp.at,
            updated_by_id: stamp.actor_id.as_str(),
        };
        let merged_extra = amenities::extra.eq(PgJsonbExpressionMethods::concat(
            amenities::extra,
            Value::Object(patch.extra),
        ));

        let updated: Option<AmenityRow> = diesel::update(amenities::table.find(id.as_uuid()))
            .set((&changes, merged_extra))
            .returning(AmenityRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        updated
            .map(row_to_amenity)
            .transpose()?
            .ok_or_else(|| EntityRepositoryError::missing(id))
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<Amenity>, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AmenityRow> = amenities::table
            .find(id.as_uuid())
            .select(AmenityRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_amenity).transpose()
    }

    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<Amenity>, EntityRepositoryError> {
        let query: amenities::BoxedQuery<'static, Pg> = match field {
            "slug" => amenities::table
                .filter(amenities::slug.eq(value.to_owned()))
                .into_boxed(),
            "name" => amenities::table
                .filter(amenities::name.eq(value.to_owned()))
                .into_boxed(),
            other => {
                return Err(EntityRepositoryError::query(format!(
                    "amenities cannot be looked up by {other}"
                )));
            }
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AmenityRow> = query
            .order_by((amenities::created_at.asc(), amenities::id.asc()))
            .select(AmenityRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_amenity).transpose()
    }

    async fn find_all(
        &self,
        criteria: &SearchCriteria<AmenityFilters>,
        page: PageRequest,
    ) -> Result<Page<Amenity>, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = matching(criteria)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<AmenityRow> = matching(criteria)
            .order_by((amenities::created_at.asc(), amenities::id.asc()))
            .offset(to_db_bound(page.offset()))
            .limit(to_db_bound(page.limit()))
            .select(AmenityRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(Page::new(rows_to_amenities(rows)?, from_db_count(total)))
    }

    async fn count(
        &self,
        criteria: &SearchCriteria<AmenityFilters>,
    ) -> Result<u64, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = matching(criteria)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(from_db_count(total))
    }

    async fn soft_delete(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<Amenity, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated: Option<AmenityRow> = diesel::update(amenities::table.find(id.as_uuid()))
            .set((
                amenities::lifecycle_state.eq(LifecycleState::Inactive.as_str()),
                amenities::deleted_at.eq(Some(stamp.at)),
                amenities::deleted_by_id.eq(Some(stamp.actor_id.as_str())),
                amenities::updated_at.eq(stamp.at),
                amenities::updated_by_id.eq(stamp.actor_id.as_str()),
            ))
            .returning(AmenityRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        updated
            .map(row_to_amenity)
            .transpose()?
            .ok_or_else(|| EntityRepositoryError::missing(id))
    }

    async fn restore(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<Amenity, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated: Option<AmenityRow> = diesel::update(amenities::table.find(id.as_uuid()))
            .set((
                amenities::lifecycle_state.eq(LifecycleState::Active.as_str()),
                amenities::deleted_at.eq(None::<DateTime<Utc>>),
                amenities::deleted_by_id.eq(None::<String>),
                amenities::updated_at.eq(stamp.at),
                amenities::updated_by_id.eq(stamp.actor_id.as_str()),
            ))
            .returning(AmenityRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        updated
            .map(row_to_amenity)
            .transpose()?
            .ok_or_else(|| EntityRepositoryError::missing(id))
    }

    async fn hard_delete(&self, id: EntityId) -> Result<u64, EntityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(amenities::table.find(id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}
