//! Port abstraction for entity persistence adapters and their errors.
//!
//! One generic trait serves every entity: the schema supplies the record,
//! create, patch and filter types. Adapters own SQL and storage concerns and
//! report failures through [`EntityRepositoryError`]; the service maps those
//! into domain errors.

use async_trait::async_trait;
use pagination::{Page, PageRequest};

use crate::domain::{AuditStamp, EntityId, EntitySchema, LifecycleState, NewEntity};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by entity repository adapters.
    pub enum EntityRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "entity repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "entity repository query failed: {message}",
        /// A uniqueness constraint rejected the write.
        Duplicate { message: String } => "entity already exists: {message}",
        /// The addressed record vanished between read and write.
        Missing { id: EntityId } => "entity {id} not found",
    }
}

/// Free-text query, lifecycle filter and entity-specific filters.
///
/// When `lifecycle_state` is `None` adapters return only `ACTIVE` records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria<F> {
    /// Trimmed, non-empty free-text query.
    pub q: Option<String>,
    /// Explicit lifecycle filter.
    pub lifecycle_state: Option<LifecycleState>,
    /// Entity-specific filters.
    pub filters: F,
}

impl<F> SearchCriteria<F> {
    /// Lifecycle state adapters should match.
    #[must_use]
    pub fn effective_lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state.unwrap_or(LifecycleState::Active)
    }
}

/// Data-model gateway for one entity type.
#[async_trait]
pub trait EntityRepository<S: EntitySchema>: Send + Sync {
    /// Insert a new record in the `ACTIVE` state.
    async fn create(
        &self,
        new: NewEntity<S::NewRecord>,
    ) -> Result<S::Entity, EntityRepositoryError>;

    /// Apply a patch and stamp the modification.
    async fn update(
        &self,
        id: EntityId,
        patch: S::Patch,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError>;

    /// Fetch a record regardless of lifecycle state.
    async fn find_by_id(&self, id: EntityId) -> Result<Option<S::Entity>, EntityRepositoryError>;

    /// Fetch the first record whose `field` equals `value`.
    ///
    /// `field` is one of the schema's lookup fields.
    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<S::Entity>, EntityRepositoryError>;

    /// Fetch one page of matches ordered by creation time, with the total
    /// number of matches.
    async fn find_all(
        &self,
        criteria: &SearchCriteria<S::Filters>,
        page: PageRequest,
    ) -> Result<Page<S::Entity>, EntityRepositoryError>;

    /// Count matches.
    async fn count(
        &self,
        criteria: &SearchCriteria<S::Filters>,
    ) -> Result<u64, EntityRepositoryError>;

    /// Move a record to `INACTIVE`.
    async fn soft_delete(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError>;

    /// Move a record back to `ACTIVE`.
    async fn restore(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError>;

    /// Remove a record, returning the number of rows deleted.
    async fn hard_delete(&self, id: EntityId) -> Result<u64, EntityRepositoryError>;
}
