//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and when the `test-support` feature is enabled.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use pagination::{Page, PageRequest};

use crate::domain::ports::{ActorDirectory, EntityRepository, EntityRepositoryError, SearchCriteria};
use crate::domain::{Actor, ActorId, AuditStamp, EntityId, EntitySchema, NewEntity, Permission, Role};
use crate::inbound::http::state::{HttpState, HttpStatePorts};
use crate::outbound::InMemoryEntityRepository;

/// Fixed instant used by fixture clocks.
///
/// # Panics
///
/// Never in practice; the literal date is valid.
#[must_use]
pub fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl FixtureClock {
    /// Freeze the clock at `utc_now`.
    #[must_use]
    pub const fn at(utc_now: DateTime<Utc>) -> Self {
        Self { utc_now }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

/// A shareable clock frozen at [`fixture_timestamp`].
#[must_use]
pub fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock::at(fixture_timestamp()))
}

/// Build an actor for tests.
///
/// # Panics
///
/// Panics when `id` is not a valid actor identifier.
pub fn actor(id: &str, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Actor {
    Actor::new(
        ActorId::new(id).expect("fixture actor id"),
        role,
        permissions,
    )
}

/// HTTP state over empty in-memory repositories and the fixture clock.
#[must_use]
pub fn in_memory_state(actors: Arc<dyn ActorDirectory>) -> HttpState {
    HttpState::new(HttpStatePorts {
        amenities: Arc::new(InMemoryEntityRepository::new()),
        destinations: Arc::new(InMemoryEntityRepository::new()),
        user_accounts: Arc::new(InMemoryEntityRepository::new()),
        actors,
        clock: fixture_clock(),
    })
}

/// Repository method invoked through a [`RecordingRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryCall {
    /// `create`.
    Create,
    /// `update`.
    Update(EntityId),
    /// `find_by_id`.
    FindById(EntityId),
    /// `find_one`.
    FindOne {
        /// Lookup field.
        field: String,
        /// Lookup value.
        value: String,
    },
    /// `find_all`.
    FindAll(PageRequest),
    /// `count`.
    Count,
    /// `soft_delete`.
    SoftDelete(EntityId),
    /// `restore`.
    Restore(EntityId),
    /// `hard_delete`.
    HardDelete(EntityId),
}

impl RepositoryCall {
    /// Whether the call mutates storage.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::Update(_)
                | Self::SoftDelete(_)
                | Self::Restore(_)
                | Self::HardDelete(_)
        )
    }
}

/// Repository wrapper recording every call before delegating.
pub struct RecordingRepository<S: EntitySchema> {
    inner: Arc<dyn EntityRepository<S>>,
    calls: Mutex<Vec<RepositoryCall>>,
}

impl<S: EntitySchema> RecordingRepository<S> {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn EntityRepository<S>>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RepositoryCall> {
        self.lock().clone()
    }

    /// Number of mutating calls seen so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.lock().iter().filter(|call| call.is_write()).count()
    }

    /// Forget recorded calls, e.g. after seeding.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn record(&self, call: RepositoryCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RepositoryCall>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl<S: EntitySchema> EntityRepository<S> for RecordingRepository<S> {
    async fn create(
        &self,
        new: NewEntity<S::NewRecord>,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.record(RepositoryCall::Create);
        self.inner.create(new).await
    }

    async fn update(
        &self,
        id: EntityId,
        patch: S::Patch,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.record(RepositoryCall::Update(id));
        self.inner.update(id, patch, stamp).await
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<S::Entity>, EntityRepositoryError> {
        self.record(RepositoryCall::FindById(id));
        self.inner.find_by_id(id).await
    }

    async fn find_one(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<S::Entity>, EntityRepositoryError> {
        self.record(RepositoryCall::FindOne {
            field: field.to_owned(),
            value: value.to_owned(),
        });
        self.inner.find_one(field, value).await
    }

    async fn find_all(
        &self,
        criteria: &SearchCriteria<S::Filters>,
        page: PageRequest,
    ) -> Result<Page<S::Entity>, EntityRepositoryError> {
        self.record(RepositoryCall::FindAll(page));
        self.inner.find_all(criteria, page).await
    }

    async fn count(
        &self,
        criteria: &SearchCriteria<S::Filters>,
    ) -> Result<u64, EntityRepositoryError> {
        self.record(RepositoryCall::Count);
        self.inner.count(criteria).await
    }

    async fn soft_delete(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.record(RepositoryCall::SoftDelete(id));
        self.inner.soft_delete(id, stamp).await
    }

    async fn restore(
        &self,
        id: EntityId,
        stamp: AuditStamp,
    ) -> Result<S::Entity, EntityRepositoryError> {
        self.record(RepositoryCall::Restore(id));
        self.inner.restore(id, stamp).await
    }

    async fn hard_delete(&self, id: EntityId) -> Result<u64, EntityRepositoryError> {
        self.record(RepositoryCall::HardDelete(id));
        self.inner.hard_delete(id).await
    }
}
