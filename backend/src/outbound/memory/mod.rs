//! In-process entity repository.
//!
//! Records live in a `tokio` read/write lock around an ordered map. Each
//! entity plugs in through [`MemoryBacked`], which teaches the adapter how to
//! build, patch and match its records. Declared unique keys are enforced on
//! every write and surface as [`EntityRepositoryError::Duplicate`].
//!
//! Used by the server when no database URL is configured and by tests.

mod records;

use std::collections::BTreeMap;

use async_trait::async_trait;
use pagination::{Page, PageRequest};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::ports::{EntityRepository, EntityRepositoryError, SearchCriteria};
use crate::domain::{
    AuditFields, AuditStamp, EntityId, EntityRecord, EntitySchema, LifecycleState, NewEntity,
};

/// Storage hooks an entity provides to the in-memory adapter.
pub trait MemoryBacked: EntitySchema {
    /// Build a stored record from normalised create fields.
    fn materialize(id: EntityId, record: Self::NewRecord, audit: AuditFields) -> Self::Entity;

    /// Apply normalised update fields in place.
    fn apply_patch(entity: &mut Self::Entity, patch: Self::Patch);

    /// Mutable access to the audit trail.
    fn audit_mut(entity: &mut Self::Entity) -> &mut AuditFields;

    /// Overwrite the lifecycle state.
    fn set_lifecycle_state(entity: &mut Self::Entity, state: LifecycleState);

    /// Whether the free-text query and entity filters match.
    ///
    /// Lifecycle filtering is handled by the adapter.
    fn matches(entity: &Self::Entity, criteria: &SearchCriteria<Self::Filters>) -> bool;

    /// Value of a lookup field, when the entity has one.
    fn field_value<'a>(entity: &'a Self::Entity, field: &str) -> Option<&'a str>;

    /// `(field, value)` pairs that must be unique across all records.
    fn unique_keys(entity: &Self::Entity) -> Vec<(&'static str, String)>;
}

/// Case-insensitive containment used for free-text queries.
pub(crate) fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug)]
struct Stored<E> {
    seq: u64,
    entity: E,
}

#[derive(Debug)]
struct Table<E> {
    next_seq: u64,
    rows: BTreeMap<EntityId, Stored<E>>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            rows: BTreeMap::new(),
        }
    }
}

/// Entity repository held entirely in memory.
#[derive(Debug)]
pub struct InMemoryEntityRepository<S: MemoryBacked> {
    table: RwLock<Table<S::Entity>>,
}

impl<S: MemoryBacked> Default for InMemoryEntityRepository<S> {
    fn default() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }
}

impl<S: MemoryBacked> InMemoryEntityRepository<S> {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(
        table: &Table<S::Entity>,
        candidate: &S::Entity,
    ) -> Result<(), EntityRepositoryError> {
        let keys = S::unique_keys(candidate);
        let own_id = candidate.id();
        for (field, value) in keys {
            let taken = table
                .rows
                .values()
                .filter(|stored| stored.entity.id() != own_id)
                .any(|stored| {
                    S::unique_keys(&stored.entity)
                        .iter()
                        .any(|(other_field, other)| *other_field == field && *other == value)
                });
            if taken {
                debug!(entity = S::NAME, field, "unique key collision");
                return Err(EntityRepositoryError::duplicate(format!(
                    "{} {field} {value:?} is taken",
                    S::NAME
                )));
            }
        }
        Ok(())
    }

    /// Rows ordered by creation time, insertion order breaking ties.
    fn ordered(table: &Table<S::Entity>) -> Vec<&S::Entity> {
        let mut rows: Vec<&Stored<S::Entity>> = table.rows.values().collect();
        rows.sort_by(|a, b| {
            a.entity
                .audit()
                .created_at
                .cmp(&b.entity.audit().created_at)
                .then(a.seq.cmp(&b.seq))
        });
        rows.into_iter().map(|stored| &stored.entity).collect()
    }

    fn matching(
        table: &Table<S::Entity>,
        criteria: &SearchCriteria<S::Filters>,
    ) -> Vec<S::Entity> {
        let state = criteria.effective_lifecycle_state();
        Self::ordered(table)
            .into_iter()
            .filter(|entity| entity.lifecycle_state() == state && S::matches(entity, criteria))
            .cloned()
            .collect()
    }

    async fn modify<F>(&self, id: EntityId, change: F) -> Result<S::Entity, EntityRepositoryError>
    where
        F: FnOnce(&mut S::Entity) + Send,
    {
        let mut table = self.table.write().await;
        let mut candidate = table
            .rows
            .get(&id)
            .map(|stored| stored.entity.clone())
            .ok_or_else(|| EntityRepositoryError::missing(id))?;
        change(&mut candidate);
        Self::ensure_unique(&table, &candidate)?;
        let stored = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EntityRepositoryError::missing(id))?;
        stored.entity = candidate.clone();
        Ok(candidate)
    }
}

#[async_trait]
impl<S: MemoryBacked> EntityRepository<S> for InMemoryEntityRepository<S> {
    async fn create(&self, new: NewEntity<S::NewRecord>) -> Result<S::Entity, EntityRepositoryError> {
        let mut table = self.table.write().await;
        let id = EntityId::random();
        let entity = S::materialize(id, new.record, AuditFields::created(&new.stamp));
        Self::ensure_unique(&table, &entity)?;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(
            id,
            Stored {
                seq,
                entity: entity.clone(),
            },
        );
        Ok(entity)
    }

    async fn update(
        &self,
        id: EntityId,
        patch: S::Patch,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.modify(id, move |entity| {
            S::apply_patch(entity, patch);
            S::audit_mut(entity).touch(&stamp);
        })
        .await
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<S::Entity>, EntityRepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).map(|stored| stored.entity.clone()))
    }

    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<S::Entity>, EntityRepositoryError> {
        let table = self.table.read().await;
        Ok(Self::ordered(&table)
            .into_iter()
            .find(|entity| S::field_value(entity, field) == Some(value))
            .cloned())
    }

    async fn find_all(
        &self,
        criteria: &SearchCriteria<S::Filters>,
        page: PageRequest,
    ) -> Result<Page<S::Entity>, EntityRepositoryError> {
        let table = self.table.read().await;
        Ok(Page::from_window(Self::matching(&table, criteria), page))
    }

    async fn count(
        &self,
        criteria: &SearchCriteria<S::Filters>,
    ) -> Result<u64, EntityRepositoryError> {
        let table = self.table.read().await;
        Ok(Self::matching(&table, criteria).len() as u64)
    }

    async fn soft_delete(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.modify(id, move |entity| {
            S::set_lifecycle_state(entity, LifecycleState::Inactive);
            S::audit_mut(entity).mark_deleted(&stamp);
        })
        .await
    }

    async fn restore(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.modify(id, move |entity| {
            S::set_lifecycle_state(entity, LifecycleState::Active);
            S::audit_mut(entity).clear_deleted(&stamp);
        })
        .await
    }

    async fn hard_delete(&self, id: EntityId) -> Result<u64, EntityRepositoryError> {
        let mut table = self.table.write().await;
        Ok(u64::from(table.rows.remove(&id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    //! Behaviour of the in-memory adapter through the repository port.

    use chrono::Duration;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::{ActorId, ExtraFields};
    use crate::domain::amenity::{AmenityFilters, AmenitySchema, AmenityType, NewAmenity};
    use crate::test_support::fixture_timestamp;

    type Repo = InMemoryEntityRepository<AmenitySchema>;

    #[fixture]
    fn repo() -> Repo {
        Repo::new()
    }

    fn stamp(minutes: i64) -> AuditStamp {
        AuditStamp::new(
            ActorId::new("admin-1").expect("actor id"),
            fixture_timestamp() + Duration::minutes(minutes),
        )
    }

    fn amenity(name: &str, slug: &str) -> NewEntity<NewAmenity> {
        NewEntity {
            record: NewAmenity {
                name: name.to_owned(),
                slug: slug.to_owned(),
                amenity_type: AmenityType::General,
                description: None,
                icon: None,
                is_builtin: false,
                extra: ExtraFields::new(),
            },
            stamp: stamp(0),
        }
    }

    fn criteria() -> SearchCriteria<AmenityFilters> {
        SearchCriteria::default()
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_slug_is_rejected(repo: Repo) {
        repo.create(amenity("Wifi", "wifi")).await.expect("first");
        let err = repo
            .create(amenity("WiFi", "wifi"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, EntityRepositoryError::Duplicate { .. }));
        assert_eq!(repo.count(&criteria()).await.expect("count"), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn update_cannot_steal_another_slug(repo: Repo) {
        repo.create(amenity("Wifi", "wifi")).await.expect("wifi");
        let pool = repo.create(amenity("Pool", "pool")).await.expect("pool");
        let patch = crate::domain::amenity::AmenityPatch {
            slug: Some("wifi".to_owned()),
            ..Default::default()
        };
        let err = repo
            .update(pool.id, patch, stamp(1))
            .await
            .expect_err("collision");
        assert!(matches!(err, EntityRepositoryError::Duplicate { .. }));
        let unchanged = repo.find_by_id(pool.id).await.expect("read").expect("row");
        assert_eq!(unchanged.slug, "pool");
    }

    #[rstest]
    #[tokio::test]
    async fn soft_deleted_rows_leave_default_search(repo: Repo) {
        let wifi = repo.create(amenity("Wifi", "wifi")).await.expect("wifi");
        repo.create(amenity("Pool", "pool")).await.expect("pool");
        let deleted = repo.soft_delete(wifi.id, stamp(5)).await.expect("delete");
        assert_eq!(deleted.lifecycle_state, LifecycleState::Inactive);
        assert_eq!(deleted.audit.deleted_at, Some(stamp(5).at));

        let active = repo
            .find_all(&criteria(), PageRequest::default())
            .await
            .expect("search");
        assert_eq!(active.total, 1);

        let inactive = SearchCriteria {
            lifecycle_state: Some(LifecycleState::Inactive),
            ..criteria()
        };
        assert_eq!(repo.count(&inactive).await.expect("count"), 1);

        let restored = repo.restore(wifi.id, stamp(6)).await.expect("restore");
        assert_eq!(restored.audit.deleted_at, None);
        assert_eq!(restored.audit.updated_at, stamp(6).at);
    }

    #[rstest]
    #[tokio::test]
    async fn results_follow_insertion_order_for_equal_timestamps(repo: Repo) {
        for n in 0..7 {
            repo.create(amenity(&format!("Item {n}"), &format!("item-{n}")))
                .await
                .expect("create");
        }
        let page = repo
            .find_all(&criteria(), PageRequest::new(2, 3).expect("page"))
            .await
            .expect("search");
        let names: Vec<_> = page.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Item 3", "Item 4", "Item 5"]);
        assert_eq!(page.total, 7);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_rows_are_reported(repo: Repo) {
        let id = EntityId::random();
        assert!(matches!(
            repo.soft_delete(id, stamp(0)).await,
            Err(EntityRepositoryError::Missing { .. })
        ));
        assert_eq!(repo.hard_delete(id).await.expect("delete"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn find_one_matches_lookup_fields(repo: Repo) {
        let wifi = repo.create(amenity("Wifi", "wifi")).await.expect("wifi");
        let by_slug = repo.find_one("slug", "wifi").await.expect("lookup");
        assert_eq!(by_slug.map(|a| a.id), Some(wifi.id));
        assert!(repo.find_one("icon", "wifi").await.expect("lookup").is_none());
    }
}
