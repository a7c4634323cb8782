//! Generic entity service pipeline.
//!
//! [`EntityService`] runs one fixed sequence of steps per operation for every
//! entity type: validate, authorise, normalise, before-hook, persist,
//! after-hook, log. Entities only influence the run through their
//! [`EntityConfig`]. Every operation returns `Result<T, Error>`; expected
//! failures never panic.
//!
//! Ordering guarantees:
//! - Input and lookup keys are validated before any authorisation check.
//! - Authorisation against an existing record may read it first, but a
//!   forbidden actor never reaches a repository write.
//! - Repository failures are logged verbatim and returned as generic
//!   `INTERNAL_ERROR`s, except uniqueness violations (`ALREADY_EXISTS`) and
//!   vanished records (`NOT_FOUND`).

mod extension;
mod params;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use pagination::Page;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::domain::ports::{EntityRepository, EntityRepositoryError};
use crate::domain::slug::is_valid_slug;
use crate::domain::{
    Actor, AuditStamp, CountResult, DeleteReceipt, EntityId, EntityRecord, Error, ErrorCode,
    LifecycleState, NewEntity, ValidationErrors, parse_input,
};

pub use extension::{
    EntityConfig, EntityHooks, EntityPolicy, EntitySchema, HookContext, HookError, NoHooks,
    Operation,
};
pub use params::{CriteriaParams, QUERY_MAX, SearchParams, parse_params, requested_page};

/// Permission-checked, validated, logged CRUD and search for one entity type.
pub struct EntityService<S: EntitySchema> {
    schema: S,
    policy: Arc<dyn EntityPolicy<S>>,
    hooks: Arc<dyn EntityHooks<S>>,
    repository: Arc<dyn EntityRepository<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: EntitySchema> EntityService<S> {
    /// Assemble a service from its configuration and clock.
    pub fn new(config: EntityConfig<S>, clock: Arc<dyn Clock>) -> Self {
        let EntityConfig {
            schema,
            policy,
            hooks,
            repository,
        } = config;
        Self {
            schema,
            policy,
            hooks,
            repository,
            clock,
        }
    }

    /// Entity name, e.g. `amenity`.
    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        S::NAME
    }

    /// Validate, authorise and insert a new entity.
    ///
    /// Audit fields come from `actor` and the service clock; audit keys in
    /// `payload` are ignored.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `FORBIDDEN`, `ALREADY_EXISTS` or `INTERNAL_ERROR`.
    pub async fn create(&self, actor: &Actor, payload: Value) -> Result<S::Entity, Error> {
        let summary = payload_summary(&payload);
        self.observe(Operation::Create, actor, summary, describe_entity::<S::Entity>, async {
            let input: S::Create = parse_input(payload)?;
            self.policy.can_create(actor, &input)?;
            let record = self.schema.normalize_create(input);
            let now = self.clock.utc();
            let ctx = self.context(actor, Operation::Create, now);
            let record = self
                .hooks
                .before_create(&ctx, record)
                .await
                .map_err(|err| hook_error(Operation::Create, err))?;
            let created = self
                .repository
                .create(NewEntity {
                    record,
                    stamp: AuditStamp::new(actor.id().clone(), now),
                })
                .await
                .map_err(repository_error)?;
            self.hooks
                .after_create(&ctx, created)
                .await
                .map_err(|err| hook_error(Operation::Create, err))
        })
        .await
    }

    /// Validate, authorise and patch an existing entity.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `NOT_FOUND`, `FORBIDDEN`, `ALREADY_EXISTS` or
    /// `INTERNAL_ERROR`.
    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        payload: Value,
    ) -> Result<S::Entity, Error> {
        let summary = format!("id={id} {}", payload_summary(&payload));
        self.observe(Operation::Update, actor, summary, describe_entity::<S::Entity>, async {
            let id = EntityId::parse(id)?;
            let input: S::Update = parse_input(payload)?;
            let existing = self.load(id).await?;
            self.policy.can_update(actor, &existing, &input)?;
            let patch = self.schema.normalize_update(input);
            let now = self.clock.utc();
            let ctx = self.context(actor, Operation::Update, now);
            let patch = self
                .hooks
                .before_update(&ctx, &existing, patch)
                .await
                .map_err(|err| hook_error(Operation::Update, err))?;
            let updated = self
                .repository
                .update(id, patch, AuditStamp::new(actor.id().clone(), now))
                .await
                .map_err(repository_error)?;
            self.hooks
                .after_update(&ctx, updated)
                .await
                .map_err(|err| hook_error(Operation::Update, err))
        })
        .await
    }

    /// Move an entity to `INACTIVE`. Already inactive entities are returned
    /// unchanged without a write.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `NOT_FOUND`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn soft_delete(&self, actor: &Actor, id: &str) -> Result<S::Entity, Error> {
        self.observe(
            Operation::SoftDelete,
            actor,
            format!("id={id}"),
            describe_entity::<S::Entity>,
            async {
                let id = EntityId::parse(id)?;
                let existing = self.load(id).await?;
                self.policy.can_soft_delete(actor, &existing)?;
                if existing.lifecycle_state() == LifecycleState::Inactive {
                    debug!(%id, "already inactive; nothing to write");
                    return Ok(existing);
                }
                let now = self.clock.utc();
                let ctx = self.context(actor, Operation::SoftDelete, now);
                self.hooks
                    .before_soft_delete(&ctx, &existing)
                    .await
                    .map_err(|err| hook_error(Operation::SoftDelete, err))?;
                let deleted = self
                    .repository
                    .soft_delete(id, AuditStamp::new(actor.id().clone(), now))
                    .await
                    .map_err(repository_error)?;
                self.hooks
                    .after_soft_delete(&ctx, deleted)
                    .await
                    .map_err(|err| hook_error(Operation::SoftDelete, err))
            },
        )
        .await
    }

    /// Move an entity back to `ACTIVE`. Already active entities are returned
    /// unchanged without a write.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `NOT_FOUND`, `FORBIDDEN`, `ALREADY_EXISTS` or
    /// `INTERNAL_ERROR`.
    pub async fn restore(&self, actor: &Actor, id: &str) -> Result<S::Entity, Error> {
        self.observe(
            Operation::Restore,
            actor,
            format!("id={id}"),
            describe_entity::<S::Entity>,
            async {
                let id = EntityId::parse(id)?;
                let existing = self.load(id).await?;
                self.policy.can_restore(actor, &existing)?;
                if existing.lifecycle_state() == LifecycleState::Active {
                    debug!(%id, "already active; nothing to write");
                    return Ok(existing);
                }
                let now = self.clock.utc();
                let ctx = self.context(actor, Operation::Restore, now);
                self.hooks
                    .before_restore(&ctx, &existing)
                    .await
                    .map_err(|err| hook_error(Operation::Restore, err))?;
                let restored = self
                    .repository
                    .restore(id, AuditStamp::new(actor.id().clone(), now))
                    .await
                    .map_err(repository_error)?;
                self.hooks
                    .after_restore(&ctx, restored)
                    .await
                    .map_err(|err| hook_error(Operation::Restore, err))
            },
        )
        .await
    }

    /// Permanently remove an entity.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `NOT_FOUND` (including when the repository removes
    /// nothing), `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn hard_delete(&self, actor: &Actor, id: &str) -> Result<DeleteReceipt, Error> {
        self.observe(
            Operation::HardDelete,
            actor,
            format!("id={id}"),
            |receipt: &DeleteReceipt| format!("id={} deleted={}", receipt.id, receipt.deleted_count),
            async {
                let id = EntityId::parse(id)?;
                let existing = self.load(id).await?;
                self.policy.can_hard_delete(actor, &existing)?;
                let now = self.clock.utc();
                let ctx = self.context(actor, Operation::HardDelete, now);
                self.hooks
                    .before_hard_delete(&ctx, &existing)
                    .await
                    .map_err(|err| hook_error(Operation::HardDelete, err))?;
                let deleted_count = self
                    .repository
                    .hard_delete(id)
                    .await
                    .map_err(repository_error)?;
                if deleted_count == 0 {
                    return Err(not_found::<S>());
                }
                let receipt = DeleteReceipt { id, deleted_count };
                self.hooks
                    .after_hard_delete(&ctx, &receipt)
                    .await
                    .map_err(|err| hook_error(Operation::HardDelete, err))?;
                Ok(receipt)
            },
        )
        .await
    }

    /// Read one entity by identifier.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `NOT_FOUND`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn get_by_id(&self, actor: &Actor, id: &str) -> Result<S::Entity, Error> {
        self.observe(
            Operation::GetById,
            actor,
            format!("id={id}"),
            describe_entity::<S::Entity>,
            async {
                let id = EntityId::parse(id)?;
                let entity = self.load(id).await?;
                self.policy.can_view(actor, &entity)?;
                Ok::<_, Error>(entity)
            },
        )
        .await
    }

    /// Read one entity by a declared lookup field.
    ///
    /// The value is trimmed and passed through
    /// [`EntitySchema::normalize_lookup`] before the repository sees it.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR` for an undeclared field or blank value, then
    /// `NOT_FOUND`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn get_by_field(
        &self,
        actor: &Actor,
        field: &str,
        value: &str,
    ) -> Result<S::Entity, Error> {
        self.observe(
            Operation::GetByField,
            actor,
            format!("field={field}"),
            describe_entity::<S::Entity>,
            async {
                let value = lookup_value(value)?;
                if !S::LOOKUP_FIELDS.contains(&field) {
                    let mut errors = ValidationErrors::new();
                    errors.push(
                        "field",
                        "unsupported",
                        format!("{field} is not a lookup field for {}", S::NAME),
                    );
                    return Err(errors.into());
                }
                let value = self.schema.normalize_lookup(field, value);
                self.find_visible(actor, field, &value).await
            },
        )
        .await
    }

    /// Read one entity by slug.
    ///
    /// # Errors
    ///
    /// `NOT_IMPLEMENTED` when the entity has no slug, `VALIDATION_ERROR` for a
    /// malformed slug, then `NOT_FOUND`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn get_by_slug(&self, actor: &Actor, slug: &str) -> Result<S::Entity, Error> {
        self.observe(
            Operation::GetBySlug,
            actor,
            format!("slug={slug}"),
            describe_entity::<S::Entity>,
            async {
                if !S::LOOKUP_FIELDS.contains(&"slug") {
                    return Err(Error::not_implemented(format!(
                        "{} has no slug lookup",
                        S::NAME
                    )));
                }
                let slug = self.schema.normalize_lookup("slug", lookup_value(slug)?);
                if !is_valid_slug(&slug) {
                    let mut errors = ValidationErrors::new();
                    errors.check_optional_slug("slug", Some(&slug));
                    return Err(errors.into());
                }
                self.find_visible(actor, "slug", &slug).await
            },
        )
        .await
    }

    /// List one page of matching entities.
    ///
    /// `params` is `{ page?, pageSize?, q?, lifecycleState?, ...filters }`;
    /// `total` counts every match regardless of the page window.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn search(&self, actor: &Actor, params: Value) -> Result<Page<S::Entity>, Error> {
        let summary = payload_summary(&params);
        self.observe(
            Operation::Search,
            actor,
            summary,
            |page: &Page<S::Entity>| format!("items={} total={}", page.items.len(), page.total),
            async {
                let params: SearchParams<S::Filters> = parse_params(params)?;
                let (request, criteria) = params.into_parts()?;
                self.policy.can_search(actor)?;
                let ctx = self.context(actor, Operation::Search, self.clock.utc());
                let criteria = self
                    .hooks
                    .before_search(&ctx, criteria)
                    .await
                    .map_err(|err| hook_error(Operation::Search, err))?;
                let page = self
                    .repository
                    .find_all(&criteria, request)
                    .await
                    .map_err(repository_error)?;
                self.hooks
                    .after_search(&ctx, page)
                    .await
                    .map_err(|err| hook_error(Operation::Search, err))
            },
        )
        .await
    }

    /// Count matching entities. Accepts the search parameters minus paging.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR`, `FORBIDDEN` or `INTERNAL_ERROR`.
    pub async fn count(&self, actor: &Actor, params: Value) -> Result<CountResult, Error> {
        let summary = payload_summary(&params);
        self.observe(
            Operation::Count,
            actor,
            summary,
            |result: &CountResult| format!("count={}", result.count),
            async {
                let params: CriteriaParams<S::Filters> = parse_params(params)?;
                let criteria = params.into_criteria();
                self.policy.can_count(actor)?;
                let ctx = self.context(actor, Operation::Count, self.clock.utc());
                let criteria = self
                    .hooks
                    .before_count(&ctx, criteria)
                    .await
                    .map_err(|err| hook_error(Operation::Count, err))?;
                let count = self
                    .repository
                    .count(&criteria)
                    .await
                    .map_err(repository_error)?;
                let count = self
                    .hooks
                    .after_count(&ctx, count)
                    .await
                    .map_err(|err| hook_error(Operation::Count, err))?;
                Ok::<_, Error>(CountResult { count })
            },
        )
        .await
    }

    fn context<'a>(
        &'a self,
        actor: &'a Actor,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> HookContext<'a, S> {
        HookContext {
            actor,
            operation,
            now,
            repository: self.repository.as_ref(),
        }
    }

    async fn load(&self, id: EntityId) -> Result<S::Entity, Error> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(repository_error)?
            .ok_or_else(not_found::<S>)
    }

    async fn find_visible(&self, actor: &Actor, field: &str, value: &str) -> Result<S::Entity, Error> {
        let entity = self
            .repository
            .find_one(field, value)
            .await
            .map_err(repository_error)?
            .ok_or_else(not_found::<S>)?;
        self.policy.can_view(actor, &entity)?;
        Ok(entity)
    }

    async fn observe<T, D, F>(
        &self,
        operation: Operation,
        actor: &Actor,
        input: String,
        describe: D,
        call: F,
    ) -> Result<T, Error>
    where
        D: FnOnce(&T) -> String,
        F: Future<Output = Result<T, Error>>,
    {
        let span = info_span!(
            "entity_call",
            entity = S::NAME,
            operation = operation.as_str(),
            actor = %actor.id(),
        );
        async move {
            debug!(%input, "started");
            let result = call.await;
            match &result {
                Ok(value) => info!(result = %describe(value), "completed"),
                Err(err) if err.code() == ErrorCode::InternalError => {
                    error!(code = %err.code(), message = err.message(), "failed");
                }
                Err(err) => warn!(code = %err.code(), message = err.message(), "rejected"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

fn describe_entity<E: EntityRecord>(entity: &E) -> String {
    format!("id={} state={}", entity.id(), entity.lifecycle_state().as_str())
}

/// Top-level keys of a payload; values are never logged.
fn payload_summary(payload: &Value) -> String {
    match payload {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("keys=[{}]", keys.join(","))
        }
        Value::Null => "keys=[]".to_owned(),
        other => format!("non-object payload ({})", json_kind(other)),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lookup_value(value: &str) -> Result<&str, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let mut errors = ValidationErrors::new();
        errors.push("value", "required", "lookup value must not be empty");
        return Err(errors.into());
    }
    Ok(trimmed)
}

fn not_found<S: EntitySchema>() -> Error {
    Error::not_found(format!("{} not found", S::NAME))
}

/// Map adapter failures into domain errors without leaking raw messages.
fn repository_error(err: EntityRepositoryError) -> Error {
    match err {
        EntityRepositoryError::Duplicate { message } => {
            warn!(%message, "uniqueness constraint rejected write");
            Error::already_exists("an entity with the same unique value already exists")
        }
        EntityRepositoryError::Missing { id } => Error::not_found(format!("entity {id} not found")),
        other => {
            error!(error = %other, "entity repository failure");
            Error::internal("entity repository failure")
        }
    }
}

fn hook_error(operation: Operation, err: HookError) -> Error {
    match err {
        HookError::Rejected(error) => error,
        HookError::Failed { message } => {
            error!(%operation, %message, "lifecycle hook failed");
            Error::internal(format!("{operation} hook failed"))
        }
    }
}
