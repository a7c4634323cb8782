//! User account entity.
//!
//! Accounts are private: an actor may read their own account, anything else
//! needs `USER_VIEW`. Changing a role always needs `USER_UPDATE`, even on
//! one's own account. A guard hook stops actors from soft or hard deleting
//! themselves.
//!
//! E-mail addresses are stored lower-cased and looked up the same way.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ports::EntityRepository;
use crate::domain::validation::{merge_extra, passthrough};
use crate::domain::{
    Actor, AuditFields, EntityConfig, EntityHooks, EntityId, EntityPolicy, EntityRecord,
    EntitySchema, Error, ExtraFields, HookContext, HookError, LifecycleState, Permission, Role,
    Validate, ValidationErrors, require_permission,
};

/// Longest display name.
pub const DISPLAY_NAME_MAX: usize = 80;
/// Longest e-mail address.
pub const EMAIL_MAX: usize = 254;

/// Persisted user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Identifier; also the actor id of the account holder.
    pub id: EntityId,
    /// Public name.
    pub display_name: String,
    /// Lower-case unique address.
    pub email: String,
    /// Platform role.
    pub role: Role,
    /// Lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Audit trail.
    #[serde(flatten)]
    pub audit: AuditFields,
    /// Undeclared keys supplied by callers.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl EntityRecord for UserAccount {
    fn id(&self) -> EntityId {
        self.id
    }

    fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state
    }

    fn audit(&self) -> &AuditFields {
        &self.audit
    }
}

fn is_self(actor: &Actor, account: &UserAccount) -> bool {
    actor.id().as_ref() == account.id.to_string()
}

fn check_email(errors: &mut ValidationErrors, value: &str) {
    let email = value.trim();
    let well_formed = email.len() <= EMAIL_MAX
        && !email.chars().any(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        });
    if !well_formed {
        errors.push("email", "invalid_email", "email must be a valid address");
    }
}

/// Create payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserAccount {
    /// Public name.
    pub display_name: String,
    /// Address, any case.
    pub email: String,
    /// Role; defaults to `USER`.
    #[serde(default = "default_role")]
    pub role: Role,
    /// Undeclared keys.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

const fn default_role() -> Role {
    Role::User
}

impl Validate for CreateUserAccount {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("displayName", &self.display_name, 1, DISPLAY_NAME_MAX);
        check_email(&mut errors, &self.email);
        errors.into_result()
    }
}

/// Update payload; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserAccount {
    /// New public name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New address.
    #[serde(default)]
    pub email: Option<String>,
    /// New role.
    #[serde(default)]
    pub role: Option<Role>,
    /// Undeclared keys to overlay.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Validate for UpdateUserAccount {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.display_name {
            errors.check_text("displayName", name, 1, DISPLAY_NAME_MAX);
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        errors.into_result()
    }
}

/// Search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountFilters {
    /// Role.
    #[serde(default)]
    pub role: Option<Role>,
}

impl Validate for UserAccountFilters {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// Normalised create fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserAccount {
    /// Trimmed name.
    pub display_name: String,
    /// Trimmed, lower-case address.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Undeclared keys, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

/// Normalised update fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAccountPatch {
    /// Trimmed name.
    pub display_name: Option<String>,
    /// Trimmed, lower-case address.
    pub email: Option<String>,
    /// Role.
    pub role: Option<Role>,
    /// Undeclared keys to overlay, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

impl UserAccountPatch {
    /// Apply to a record.
    pub fn apply(self, account: &mut UserAccount) {
        if let Some(name) = self.display_name {
            account.display_name = name;
        }
        if let Some(email) = self.email {
            account.email = email;
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        merge_extra(&mut account.extra, self.extra);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account types and normalisers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAccountSchema;

impl EntitySchema for UserAccountSchema {
    type Entity = UserAccount;
    type Create = CreateUserAccount;
    type Update = UpdateUserAccount;
    type Filters = UserAccountFilters;
    type NewRecord = NewUserAccount;
    type Patch = UserAccountPatch;

    const NAME: &'static str = "userAccount";
    const LOOKUP_FIELDS: &'static [&'static str] = &["email"];

    fn normalize_create(&self, input: CreateUserAccount) -> NewUserAccount {
        NewUserAccount {
            display_name: input.display_name.trim().to_owned(),
            email: normalize_email(&input.email),
            role: input.role,
            extra: passthrough(input.extra),
        }
    }

    fn normalize_update(&self, input: UpdateUserAccount) -> UserAccountPatch {
        UserAccountPatch {
            display_name: input.display_name.map(|name| name.trim().to_owned()),
            email: input.email.as_deref().map(normalize_email),
            role: input.role,
            extra: passthrough(input.extra),
        }
    }

    fn normalize_lookup(&self, field: &str, value: &str) -> String {
        match field {
            "email" => normalize_email(value),
            _ => value.to_owned(),
        }
    }
}

/// User account authorisation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAccountPolicy;

impl EntityPolicy<UserAccountSchema> for UserAccountPolicy {
    fn can_create(&self, actor: &Actor, _input: &CreateUserAccount) -> Result<(), Error> {
        require_permission(actor, Permission::UserCreate)
    }

    fn can_update(
        &self,
        actor: &Actor,
        existing: &UserAccount,
        input: &UpdateUserAccount,
    ) -> Result<(), Error> {
        if is_self(actor, existing) && input.role.is_none() {
            return Ok(());
        }
        require_permission(actor, Permission::UserUpdate)
    }

    fn can_soft_delete(&self, actor: &Actor, _existing: &UserAccount) -> Result<(), Error> {
        require_permission(actor, Permission::UserSoftDelete)
    }

    fn can_restore(&self, actor: &Actor, _existing: &UserAccount) -> Result<(), Error> {
        require_permission(actor, Permission::UserRestore)
    }

    fn can_hard_delete(&self, actor: &Actor, _existing: &UserAccount) -> Result<(), Error> {
        require_permission(actor, Permission::UserHardDelete)
    }

    fn can_view(&self, actor: &Actor, entity: &UserAccount) -> Result<(), Error> {
        if is_self(actor, entity) {
            Ok(())
        } else {
            require_permission(actor, Permission::UserView)
        }
    }

    fn can_search(&self, actor: &Actor) -> Result<(), Error> {
        require_permission(actor, Permission::UserView)
    }

    fn can_count(&self, actor: &Actor) -> Result<(), Error> {
        require_permission(actor, Permission::UserView)
    }
}

/// Refuses self-deletion.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAccountHooks;

impl UserAccountHooks {
    fn guard_self(actor: &Actor, existing: &UserAccount) -> Result<(), HookError> {
        if is_self(actor, existing) {
            Err(HookError::Rejected(Error::forbidden()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityHooks<UserAccountSchema> for UserAccountHooks {
    async fn before_soft_delete(
        &self,
        ctx: &HookContext<'_, UserAccountSchema>,
        existing: &UserAccount,
    ) -> Result<(), HookError> {
        Self::guard_self(ctx.actor, existing)
    }

    async fn before_hard_delete(
        &self,
        ctx: &HookContext<'_, UserAccountSchema>,
        existing: &UserAccount,
    ) -> Result<(), HookError> {
        Self::guard_self(ctx.actor, existing)
    }
}

/// Pipeline configuration for user accounts over `repository`.
pub fn user_account_config(
    repository: Arc<dyn EntityRepository<UserAccountSchema>>,
) -> EntityConfig<UserAccountSchema> {
    EntityConfig {
        schema: UserAccountSchema,
        policy: Arc::new(UserAccountPolicy),
        hooks: Arc::new(UserAccountHooks),
        repository,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, AuditStamp, ErrorCode, parse_input};
    use crate::test_support::{actor, fixture_timestamp};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn account() -> UserAccount {
        let stamp = AuditStamp::new(ActorId::new("admin-1").expect("id"), fixture_timestamp());
        UserAccount {
            id: EntityId::random(),
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
            role: Role::User,
            lifecycle_state: LifecycleState::Active,
            audit: AuditFields::created(&stamp),
            extra: ExtraFields::new(),
        }
    }

    fn holder(account: &UserAccount, permissions: impl IntoIterator<Item = Permission>) -> Actor {
        actor(&account.id.to_string(), Role::User, permissions)
    }

    #[rstest]
    fn email_is_lower_cased() {
        let input: CreateUserAccount =
            parse_input(json!({ "displayName": " Ada ", "email": " Ada@Example.COM " }))
                .expect("valid");
        let record = UserAccountSchema.normalize_create(input);
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(record.display_name, "Ada");
        assert_eq!(record.role, Role::User);
    }

    #[rstest]
    fn email_lookups_are_lower_cased() {
        assert_eq!(
            UserAccountSchema.normalize_lookup("email", "Grace@Example.com"),
            "grace@example.com"
        );
    }

    #[rstest]
    #[case("ada")]
    #[case("ada@localhost")]
    #[case("a da@example.com")]
    #[case("@example.com")]
    #[case("ada@@example.com")]
    fn malformed_email_is_rejected(#[case] email: &str) {
        let err = parse_input::<CreateUserAccount>(json!({ "displayName": "Ada", "email": email }))
            .expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[rstest]
    fn holders_can_view_and_rename_themselves(account: UserAccount) {
        let me = holder(&account, []);
        assert!(UserAccountPolicy.can_view(&me, &account).is_ok());
        let rename = UpdateUserAccount {
            display_name: Some("Ada L.".into()),
            ..UpdateUserAccount::default()
        };
        assert!(UserAccountPolicy.can_update(&me, &account, &rename).is_ok());
    }

    #[rstest]
    fn role_changes_need_permission_even_for_self(account: UserAccount) {
        let me = holder(&account, []);
        let promote = UpdateUserAccount {
            role: Some(Role::Admin),
            ..UpdateUserAccount::default()
        };
        let err = UserAccountPolicy
            .can_update(&me, &account, &promote)
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn strangers_need_user_view(account: UserAccount) {
        let stranger = actor("user-2", Role::User, []);
        assert!(UserAccountPolicy.can_view(&stranger, &account).is_err());
        assert!(UserAccountPolicy.can_search(&stranger).is_err());
        let auditor = actor("auditor", Role::Admin, [Permission::UserView]);
        assert!(UserAccountPolicy.can_view(&auditor, &account).is_ok());
        assert!(UserAccountPolicy.can_count(&auditor).is_ok());
    }

    #[rstest]
    fn self_deletion_is_guarded(account: UserAccount) {
        let me = holder(&account, [Permission::UserSoftDelete]);
        let result = UserAccountHooks::guard_self(&me, &account);
        assert!(matches!(result, Err(HookError::Rejected(err)) if err.code() == ErrorCode::Forbidden));
        let other = actor("admin-1", Role::Admin, [Permission::UserSoftDelete]);
        assert!(UserAccountHooks::guard_self(&other, &account).is_ok());
    }
}
