//! Calling identity passed explicitly into every service operation.
//!
//! An [`Actor`] is built by the inbound boundary (or a test) for each call and
//! is never mutated by the pipeline. Authorisation is flat set membership over
//! [`Permission`] values; roles carry no implied permissions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Error;

/// Validation errors raised when constructing actor identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorValidationError {
    /// The identifier was empty.
    #[error("actor id must not be empty")]
    EmptyId,
    /// The identifier carried leading or trailing whitespace.
    #[error("actor id must not contain surrounding whitespace")]
    UntrimmedId,
}

/// Stable identifier of the calling identity, e.g. `admin-1` or a user UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ActorValidationError`] for blank or untrimmed input.
    pub fn new(id: impl Into<String>) -> Result<Self, ActorValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ActorValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(ActorValidationError::UntrimmedId);
        }
        Ok(Self(id))
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier used for the unauthenticated caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self("anonymous".to_owned())
    }
}

impl AsRef<str> for ActorId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = ActorValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Role of the caller. Informational; grants nothing by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform operator.
    SuperAdmin,
    /// Tenant administrator.
    Admin,
    /// Content editor.
    Editor,
    /// Accommodation host.
    Host,
    /// Registered traveller.
    User,
    /// Unauthenticated visitor.
    Guest,
}

/// Capability scoped to one entity and one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Create amenities.
    AmenityCreate,
    /// Update amenities.
    AmenityUpdate,
    /// Soft delete amenities.
    AmenitySoftDelete,
    /// Restore soft-deleted amenities.
    AmenityRestore,
    /// Permanently remove amenities.
    AmenityHardDelete,
    /// Create destinations.
    DestinationCreate,
    /// Update destinations.
    DestinationUpdate,
    /// Soft delete destinations.
    DestinationSoftDelete,
    /// Restore soft-deleted destinations.
    DestinationRestore,
    /// Permanently remove destinations.
    DestinationHardDelete,
    /// Read private and draft destinations.
    DestinationViewPrivate,
    /// Create user accounts.
    UserCreate,
    /// Update user accounts.
    UserUpdate,
    /// Soft delete user accounts.
    UserSoftDelete,
    /// Restore soft-deleted user accounts.
    UserRestore,
    /// Permanently remove user accounts.
    UserHardDelete,
    /// Read and list other users' accounts.
    UserView,
}

/// Calling identity: id, role and flat permission set.
///
/// # Examples
/// ```
/// use hospitality_backend::domain::{Actor, ActorId, Permission, Role};
///
/// let actor = Actor::new(
///     ActorId::new("admin-1").unwrap(),
///     Role::Admin,
///     [Permission::AmenityCreate],
/// );
/// assert!(actor.has(Permission::AmenityCreate));
/// assert!(!actor.has(Permission::AmenityHardDelete));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    id: ActorId,
    role: Role,
    #[serde(default)]
    permissions: BTreeSet<Permission>,
}

impl Actor {
    /// Build an actor from its parts.
    pub fn new(id: ActorId, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            id,
            role,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// The unauthenticated caller: guest role, no permissions.
    #[must_use]
    pub fn guest() -> Self {
        Self::new(ActorId::anonymous(), Role::Guest, [])
    }

    /// Caller identifier.
    #[must_use]
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Caller role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Granted permissions.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Whether `permission` is in the actor's set.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Succeed when `actor` holds `permission`, otherwise return a generic
/// `FORBIDDEN` error.
///
/// # Errors
///
/// Returns [`Error::forbidden`] when the permission is missing.
pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), Error> {
    if actor.has(permission) {
        Ok(())
    } else {
        Err(Error::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("", ActorValidationError::EmptyId)]
    #[case(" admin-1", ActorValidationError::UntrimmedId)]
    fn actor_id_rejects_malformed_input(#[case] raw: &str, #[case] expected: ActorValidationError) {
        assert_eq!(ActorId::new(raw), Err(expected));
    }

    #[rstest]
    fn guest_has_no_permissions() {
        let guest = Actor::guest();
        assert_eq!(guest.role(), Role::Guest);
        assert!(guest.permissions().is_empty());
    }

    #[rstest]
    fn require_permission_is_set_membership() {
        let actor = Actor::new(
            ActorId::new("editor-1").expect("id"),
            Role::SuperAdmin,
            [Permission::DestinationUpdate],
        );
        assert!(require_permission(&actor, Permission::DestinationUpdate).is_ok());
        let err = require_permission(&actor, Permission::DestinationCreate)
            .expect_err("role does not imply permissions");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn deserialises_wire_shape() {
        let actor: Actor = serde_json::from_value(json!({
            "id": "admin-1",
            "role": "ADMIN",
            "permissions": ["AMENITY_CREATE", "DESTINATION_VIEW_PRIVATE"],
        }))
        .expect("actor payload");
        assert_eq!(actor.id().as_ref(), "admin-1");
        assert!(actor.has(Permission::DestinationViewPrivate));
    }
}
