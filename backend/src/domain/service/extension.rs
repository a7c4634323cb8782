//! Extension points an entity plugs into the generic pipeline.
//!
//! An entity is described by an [`EntitySchema`] (types and pure normalisers),
//! an [`EntityPolicy`] (one predicate per action) and an [`EntityHooks`]
//! implementation (async before/after hooks, all defaulting to no-ops).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::Page;
use serde::de::DeserializeOwned;

use crate::domain::ports::{EntityRepository, EntityRepositoryError, SearchCriteria};
use crate::domain::{Actor, DeleteReceipt, EntityRecord, Error, Validate};

/// Static description of one entity type.
pub trait EntitySchema: Send + Sync + 'static {
    /// Persisted record.
    type Entity: EntityRecord;
    /// Validated create input.
    type Create: DeserializeOwned + Validate + Send + Sync;
    /// Validated update input.
    type Update: DeserializeOwned + Validate + Send + Sync;
    /// Entity-specific search filters.
    type Filters: DeserializeOwned + Validate + Default + Clone + fmt::Debug + Send + Sync;
    /// Persistence-ready create fields.
    type NewRecord: Clone + fmt::Debug + Send + Sync;
    /// Persistence-ready update fields.
    type Patch: Clone + fmt::Debug + Send + Sync;

    /// Entity name used in logs and messages, e.g. `amenity`.
    const NAME: &'static str;
    /// Fields accepted by `get_by_field`, in wire casing.
    const LOOKUP_FIELDS: &'static [&'static str];

    /// Shape validated create input for persistence.
    ///
    /// Must be deterministic: no clock reads, no randomness.
    fn normalize_create(&self, input: Self::Create) -> Self::NewRecord;

    /// Shape validated update input for persistence.
    fn normalize_update(&self, input: Self::Update) -> Self::Patch;

    /// Shape a trimmed lookup value the way stored values of `field` are
    /// shaped, so lookups match what the normalisers persisted.
    fn normalize_lookup(&self, _field: &str, value: &str) -> String {
        value.to_owned()
    }
}

/// Authorisation predicates for one entity type.
///
/// Every method is required so each entity states its read policy explicitly.
/// Failures should be [`Error::forbidden`], which never explains the rule.
pub trait EntityPolicy<S: EntitySchema>: Send + Sync {
    /// May `actor` create an entity from `input`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_create(&self, actor: &Actor, input: &S::Create) -> Result<(), Error>;

    /// May `actor` apply `input` to `existing`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_update(&self, actor: &Actor, existing: &S::Entity, input: &S::Update)
    -> Result<(), Error>;

    /// May `actor` soft delete `existing`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_soft_delete(&self, actor: &Actor, existing: &S::Entity) -> Result<(), Error>;

    /// May `actor` restore `existing`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_restore(&self, actor: &Actor, existing: &S::Entity) -> Result<(), Error>;

    /// May `actor` permanently remove `existing`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_hard_delete(&self, actor: &Actor, existing: &S::Entity) -> Result<(), Error>;

    /// May `actor` read `entity`?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_view(&self, actor: &Actor, entity: &S::Entity) -> Result<(), Error>;

    /// May `actor` list entities?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_search(&self, actor: &Actor) -> Result<(), Error>;

    /// May `actor` count entities?
    ///
    /// # Errors
    ///
    /// Returns `FORBIDDEN` when not.
    fn can_count(&self, actor: &Actor) -> Result<(), Error>;
}

/// Pipeline operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert.
    Create,
    /// Patch.
    Update,
    /// Move to `INACTIVE`.
    SoftDelete,
    /// Move back to `ACTIVE`.
    Restore,
    /// Remove permanently.
    HardDelete,
    /// Read by identifier.
    GetById,
    /// Read by a lookup field.
    GetByField,
    /// Read by slug.
    GetBySlug,
    /// Paged listing.
    Search,
    /// Match count.
    Count,
}

impl Operation {
    /// Log-friendly operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::SoftDelete => "softDelete",
            Self::Restore => "restore",
            Self::HardDelete => "hardDelete",
            Self::GetById => "getById",
            Self::GetByField => "getByField",
            Self::GetBySlug => "getBySlug",
            Self::Search => "search",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook may inspect about the running call.
pub struct HookContext<'a, S: EntitySchema> {
    /// Calling identity.
    pub actor: &'a Actor,
    /// Running operation.
    pub operation: Operation,
    /// Instant read from the service clock for this call.
    pub now: DateTime<Utc>,
    /// Repository for pre-checks such as slug uniqueness.
    pub repository: &'a dyn EntityRepository<S>,
}

/// Failure raised inside a hook.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    /// A deliberate typed rejection, returned to the caller unchanged.
    #[error(transparent)]
    Rejected(Error),
    /// Anything else; surfaces as `INTERNAL_ERROR`.
    #[error("hook failed: {message}")]
    Failed {
        /// Diagnostic message, logged but never returned.
        message: String,
    },
}

impl HookError {
    /// Build a [`HookError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<Error> for HookError {
    fn from(value: Error) -> Self {
        Self::Rejected(value)
    }
}

impl From<EntityRepositoryError> for HookError {
    fn from(value: EntityRepositoryError) -> Self {
        Self::failed(value.to_string())
    }
}

/// Lifecycle hooks around each operation. Every hook defaults to a no-op.
#[async_trait]
pub trait EntityHooks<S: EntitySchema>: Send + Sync {
    /// Runs after normalisation, before insert. May reshape the record.
    async fn before_create(
        &self,
        _ctx: &HookContext<'_, S>,
        record: S::NewRecord,
    ) -> Result<S::NewRecord, HookError> {
        Ok(record)
    }

    /// Runs after insert.
    async fn after_create(
        &self,
        _ctx: &HookContext<'_, S>,
        entity: S::Entity,
    ) -> Result<S::Entity, HookError> {
        Ok(entity)
    }

    /// Runs after normalisation, before the patch is applied.
    async fn before_update(
        &self,
        _ctx: &HookContext<'_, S>,
        _existing: &S::Entity,
        patch: S::Patch,
    ) -> Result<S::Patch, HookError> {
        Ok(patch)
    }

    /// Runs after the patch is applied.
    async fn after_update(
        &self,
        _ctx: &HookContext<'_, S>,
        entity: S::Entity,
    ) -> Result<S::Entity, HookError> {
        Ok(entity)
    }

    /// Runs before an `ACTIVE` record is deactivated.
    async fn before_soft_delete(
        &self,
        _ctx: &HookContext<'_, S>,
        _existing: &S::Entity,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after deactivation.
    async fn after_soft_delete(
        &self,
        _ctx: &HookContext<'_, S>,
        entity: S::Entity,
    ) -> Result<S::Entity, HookError> {
        Ok(entity)
    }

    /// Runs before an `INACTIVE` record is reactivated.
    async fn before_restore(
        &self,
        _ctx: &HookContext<'_, S>,
        _existing: &S::Entity,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after reactivation.
    async fn after_restore(
        &self,
        _ctx: &HookContext<'_, S>,
        entity: S::Entity,
    ) -> Result<S::Entity, HookError> {
        Ok(entity)
    }

    /// Runs before permanent removal.
    async fn before_hard_delete(
        &self,
        _ctx: &HookContext<'_, S>,
        _existing: &S::Entity,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after permanent removal.
    async fn after_hard_delete(
        &self,
        _ctx: &HookContext<'_, S>,
        _receipt: &DeleteReceipt,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before a search. May tighten the criteria.
    async fn before_search(
        &self,
        _ctx: &HookContext<'_, S>,
        criteria: SearchCriteria<S::Filters>,
    ) -> Result<SearchCriteria<S::Filters>, HookError> {
        Ok(criteria)
    }

    /// Runs after a search.
    async fn after_search(
        &self,
        _ctx: &HookContext<'_, S>,
        page: Page<S::Entity>,
    ) -> Result<Page<S::Entity>, HookError> {
        Ok(page)
    }

    /// Runs before a count. May tighten the criteria.
    async fn before_count(
        &self,
        _ctx: &HookContext<'_, S>,
        criteria: SearchCriteria<S::Filters>,
    ) -> Result<SearchCriteria<S::Filters>, HookError> {
        Ok(criteria)
    }

    /// Runs after a count.
    async fn after_count(&self, _ctx: &HookContext<'_, S>, count: u64) -> Result<u64, HookError> {
        Ok(count)
    }
}

/// Hooks for entities with no lifecycle side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<S: EntitySchema> EntityHooks<S> for NoHooks {}

/// Everything the pipeline needs to serve one entity type.
pub struct EntityConfig<S: EntitySchema> {
    /// Types and normalisers.
    pub schema: S,
    /// Authorisation predicates.
    pub policy: Arc<dyn EntityPolicy<S>>,
    /// Lifecycle hooks.
    pub hooks: Arc<dyn EntityHooks<S>>,
    /// Data-model adapter.
    pub repository: Arc<dyn EntityRepository<S>>,
}
