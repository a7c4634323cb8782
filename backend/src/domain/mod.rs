//! Domain primitives, the generic entity pipeline and concrete entities.
//!
//! Purpose: keep business rules transport and storage agnostic. Inbound
//! adapters build an [`Actor`] and call an [`EntityService`]; outbound adapters
//! implement the [`ports`] traits.
//!
//! Public surface:
//! - Error, ErrorCode: typed failures returned by every operation.
//! - Actor, Permission, Role: the calling identity.
//! - EntityService and its extension traits: the CRUD/search pipeline.
//! - amenity, destination, user_account: entity configurations.

pub mod actor;
pub mod amenity;
pub mod destination;
pub mod entity;
pub mod error;
pub mod ports;
pub mod service;
pub mod slug;
pub mod trace_id;
pub mod user_account;
pub mod validation;

pub use self::actor::{Actor, ActorId, ActorValidationError, Permission, Role, require_permission};
pub use self::entity::{
    AuditFields, AuditStamp, CountResult, DeleteReceipt, EntityId, EntityRecord, LifecycleState,
    NewEntity,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::service::{
    EntityConfig, EntityHooks, EntityPolicy, EntitySchema, EntityService, HookContext, HookError,
    NoHooks, Operation,
};
pub use self::slug::slugify;
pub use self::trace_id::TraceId;
pub use self::validation::{ExtraFields, FieldIssue, Validate, ValidationErrors, parse_input};

/// Convenient service result alias.
///
/// # Examples
/// ```
/// use hospitality_backend::domain::{Error, ServiceResult};
///
/// fn lookup() -> ServiceResult<u32> {
///     Err(Error::forbidden())
/// }
/// assert!(lookup().is_err());
/// ```
pub type ServiceResult<T> = Result<T, Error>;
