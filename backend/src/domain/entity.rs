//! Shared entity primitives: identifiers, lifecycle state and audit fields.
//!
//! Audit fields are written only by the service pipeline, from the calling
//! actor and the injected clock. Caller payloads never reach them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ActorId, Error};

/// Branded entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a raw lookup key, reporting malformed input as a validation error.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` naming the `id` field.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        raw.parse().map_err(|_| {
            Error::validation("id must be a valid UUID").with_details(serde_json::json!({
                "issues": [{ "field": "id", "code": "invalid_uuid", "message": "id must be a valid UUID" }],
            }))
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle state of a persisted entity.
///
/// `ACTIVE -> INACTIVE` via soft delete, back via restore. Hard deletion removes
/// the record and has no state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Visible and editable.
    #[default]
    Active,
    /// Soft deleted; `deletedAt` is set.
    Inactive,
}

impl LifecycleState {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(format!("unknown lifecycle state {other:?}")),
        }
    }
}

/// Who did something and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    /// Acting identity.
    pub actor_id: ActorId,
    /// Instant read from the service clock.
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    /// Build a stamp.
    #[must_use]
    pub const fn new(actor_id: ActorId, at: DateTime<Utc>) -> Self {
        Self { actor_id, at }
    }
}

/// Audit trail carried by every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFields {
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Creator.
    pub created_by_id: ActorId,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
    /// Last modifier.
    pub updated_by_id: ActorId,
    /// Soft deletion instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Soft deleter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by_id: Option<ActorId>,
}

impl AuditFields {
    /// Audit fields for a freshly created record.
    #[must_use]
    pub fn created(stamp: &AuditStamp) -> Self {
        Self {
            created_at: stamp.at,
            created_by_id: stamp.actor_id.clone(),
            updated_at: stamp.at,
            updated_by_id: stamp.actor_id.clone(),
            deleted_at: None,
            deleted_by_id: None,
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, stamp: &AuditStamp) {
        self.updated_at = stamp.at;
        self.updated_by_id = stamp.actor_id.clone();
    }

    /// Record a soft deletion.
    pub fn mark_deleted(&mut self, stamp: &AuditStamp) {
        self.touch(stamp);
        self.deleted_at = Some(stamp.at);
        self.deleted_by_id = Some(stamp.actor_id.clone());
    }

    /// Record a restore.
    pub fn clear_deleted(&mut self, stamp: &AuditStamp) {
        self.touch(stamp);
        self.deleted_at = None;
        self.deleted_by_id = None;
    }
}

/// Behaviour every persisted entity exposes to the pipeline.
pub trait EntityRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identifier.
    fn id(&self) -> EntityId;
    /// Current lifecycle state.
    fn lifecycle_state(&self) -> LifecycleState;
    /// Audit trail.
    fn audit(&self) -> &AuditFields;
}

/// Normalised create payload plus pipeline-owned audit data.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity<R> {
    /// Persistence-ready fields produced by the normaliser and hooks.
    pub record: R,
    /// Creation stamp.
    pub stamp: AuditStamp,
}

/// Outcome of a hard delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    /// Removed identifier.
    pub id: EntityId,
    /// Rows removed by the repository.
    pub deleted_count: u64,
}

/// Outcome of a count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResult {
    /// Number of matching records.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use chrono::TimeZone;
    use rstest::rstest;

    fn stamp(actor: &str, hour: u32) -> AuditStamp {
        AuditStamp::new(
            ActorId::new(actor).expect("actor id"),
            Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
                .single()
                .expect("fixture time"),
        )
    }

    #[rstest]
    fn parse_reports_validation_error_for_garbage() {
        let err = EntityId::parse("nope").expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[rstest]
    fn parse_accepts_uuid() {
        let id = EntityId::random();
        assert_eq!(EntityId::parse(&id.to_string()).expect("valid"), id);
    }

    #[rstest]
    fn audit_transitions_track_actor_and_time() {
        let mut audit = AuditFields::created(&stamp("admin-1", 8));
        audit.mark_deleted(&stamp("admin-2", 9));
        assert_eq!(audit.created_by_id.as_ref(), "admin-1");
        assert_eq!(audit.deleted_by_id.as_ref().map(AsRef::as_ref), Some("admin-2"));
        assert!(audit.deleted_at.is_some());

        audit.clear_deleted(&stamp("admin-3", 10));
        assert!(audit.deleted_at.is_none());
        assert_eq!(audit.updated_by_id.as_ref(), "admin-3");
    }

    #[rstest]
    fn lifecycle_state_round_trips_storage_text() {
        for state in [LifecycleState::Active, LifecycleState::Inactive] {
            assert_eq!(state.as_str().parse::<LifecycleState>(), Ok(state));
        }
    }
}
