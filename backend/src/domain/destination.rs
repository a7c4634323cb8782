//! Destination entity: a travel destination page.
//!
//! Destinations carry a visibility. Public ones are readable by anyone;
//! private and draft ones require `DESTINATION_VIEW_PRIVATE`, including in
//! listings, where the before-search hook pins visibility to `PUBLIC` for
//! actors without that permission.
//!
//! Slugs are derived from the name when not supplied. The before-create hook
//! probes for a free slug by suffixing `-2`, `-3` and so on; the repository's
//! unique constraint remains the authority under concurrent creates.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ports::{EntityRepository, SearchCriteria};
use crate::domain::slug::with_suffix;
use crate::domain::validation::{
    explicit, merge_extra, normalize_clearable_text, normalize_optional_text, passthrough,
};
use crate::domain::{
    Actor, AuditFields, EntityConfig, EntityHooks, EntityId, EntityPolicy, EntityRecord,
    EntitySchema, Error, ExtraFields, HookContext, HookError, LifecycleState, Permission,
    Validate, ValidationErrors, require_permission, slugify,
};

/// Longest destination name.
pub const NAME_MAX: usize = 120;
/// Longest summary.
pub const SUMMARY_MAX: usize = 1000;
/// Suffix attempts before giving up on a derived slug.
pub const SLUG_ATTEMPTS: u32 = 50;

/// Who may read a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Everyone.
    #[default]
    Public,
    /// Privileged actors only.
    Private,
    /// Work in progress; privileged actors only.
    Draft,
}

/// Persisted destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Unique URL-safe key.
    pub slug: String,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// ISO 3166-1 alpha-2 code, upper case.
    pub country_code: String,
    /// Read access.
    pub visibility: Visibility,
    /// Lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Audit trail.
    #[serde(flatten)]
    pub audit: AuditFields,
    /// Undeclared keys supplied by callers.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl EntityRecord for Destination {
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

fn check_country_code(errors: &mut ValidationErrors, value: &str) {
    let code = value.trim();
    if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        errors.push(
            "countryCode",
            "invalid_country_code",
            "countryCode must be a two-letter ISO code",
        );
    }
}

/// Create payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDestination {
    /// Display name.
    pub name: String,
    /// Explicit slug; derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Short description.
    #[serde(default)]
    pub summary: Option<String>,
    /// Two-letter country code, any case.
    pub country_code: String,
    /// Read access; defaults to `PUBLIC`.
    #[serde(default)]
    pub visibility: Visibility,
    /// Undeclared keys.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Validate for CreateDestination {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", &self.name, 1, NAME_MAX);
        errors.check_optional_slug("slug", self.slug.as_deref());
        errors.check_optional_text("summary", self.summary.as_deref(), SUMMARY_MAX);
        check_country_code(&mut errors, &self.country_code);
        if self.slug.is_none() && !self.name.trim().is_empty() && slugify(&self.name).is_none() {
            errors.push(
                "name",
                "no_slug",
                "name must contain a letter or digit to derive a slug",
            );
        }
        errors.into_result()
    }
}

/// Update payload; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDestination {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// New summary; `null` or blank clears it.
    #[serde(default, deserialize_with = "explicit")]
    pub summary: Option<Option<String>>,
    /// New country code.
    #[serde(default)]
    pub country_code: Option<String>,
    /// New visibility.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Undeclared keys to overlay.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Validate for UpdateDestination {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.check_text("name", name, 1, NAME_MAX);
        }
        errors.check_optional_slug("slug", self.slug.as_deref());
        errors.check_optional_text(
            "summary",
            self.summary.as_ref().and_then(Option::as_deref),
            SUMMARY_MAX,
        );
        if let Some(code) = &self.country_code {
            check_country_code(&mut errors, code);
        }
        errors.into_result()
    }
}

/// Search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationFilters {
    /// Visibility.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Country code, any case.
    #[serde(default)]
    pub country_code: Option<String>,
}

impl Validate for DestinationFilters {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(code) = &self.country_code {
            check_country_code(&mut errors, code);
        }
        errors.into_result()
    }
}

/// Normalised create fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDestination {
    /// Trimmed name.
    pub name: String,
    /// Slug candidate; final once the before-create hook has run.
    pub slug: String,
    /// Whether the caller supplied the slug. Explicit slugs are never suffixed.
    pub slug_requested: bool,
    /// Trimmed summary.
    pub summary: Option<String>,
    /// Upper-case country code.
    pub country_code: String,
    /// Read access.
    pub visibility: Visibility,
    /// Undeclared keys, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

/// Normalised update fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationPatch {
    /// Trimmed name.
    pub name: Option<String>,
    /// Slug.
    pub slug: Option<String>,
    /// Trimmed summary; `Some(None)` clears.
    pub summary: Option<Option<String>>,
    /// Upper-case country code.
    pub country_code: Option<String>,
    /// Read access.
    pub visibility: Option<Visibility>,
    /// Undeclared keys to overlay, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

impl DestinationPatch {
    /// Apply to a record.
    pub fn apply(self, destination: &mut Destination) {
        if let Some(name) = self.name {
            destination.name = name;
        }
        if let Some(slug) = self.slug {
            destination.slug = slug;
        }
        if let Some(summary) = self.summary {
            destination.summary = summary;
        }
        if let Some(code) = self.country_code {
            destination.country_code = code;
        }
        if let Some(visibility) = self.visibility {
            destination.visibility = visibility;
        }
        merge_extra(&mut destination.extra, self.extra);
    }
}

/// Destination types and normalisers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DestinationSchema;

impl EntitySchema for DestinationSchema {
    type Entity = Destination;
    type Create = CreateDestination;
    type Update = UpdateDestination;
    type Filters = DestinationFilters;
    type NewRecord = NewDestination;
    type Patch = DestinationPatch;

    const NAME: &'static str = "destination";
    const LOOKUP_FIELDS: &'static [&'static str] = &["slug", "name"];

    fn normalize_create(&self, input: CreateDestination) -> NewDestination {
        let name = input.name.trim().to_owned();
        let slug_requested = input.slug.is_some();
        let slug = input
            .slug
            .or_else(|| slugify(&name))
            .unwrap_or_default();
        NewDestination {
            name,
            slug,
            slug_requested,
            summary: normalize_optional_text(input.summary),
            country_code: input.country_code.trim().to_ascii_uppercase(),
            visibility: input.visibility,
            extra: passthrough(input.extra),
        }
    }

    fn normalize_update(&self, input: UpdateDestination) -> DestinationPatch {
        DestinationPatch {
            name: input.name.map(|name| name.trim().to_owned()),
            slug: input.slug,
            summary: normalize_clearable_text(input.summary),
            country_code: input.country_code.map(|code| code.trim().to_ascii_uppercase()),
            visibility: input.visibility,
            extra: passthrough(input.extra),
        }
    }
}

fn may_see_hidden(actor: &Actor) -> bool {
    actor.has(Permission::DestinationViewPrivate)
}

/// Destination authorisation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DestinationPolicy;

impl EntityPolicy<DestinationSchema> for DestinationPolicy {
    fn can_create(&self, actor: &Actor, _input: &CreateDestination) -> Result<(), Error> {
        require_permission(actor, Permission::DestinationCreate)
    }

    fn can_update(
        &self,
        actor: &Actor,
        _existing: &Destination,
        _input: &UpdateDestination,
    ) -> Result<(), Error> {
        require_permission(actor, Permission::DestinationUpdate)
    }

    fn can_soft_delete(&self, actor: &Actor, _existing: &Destination) -> Result<(), Error> {
        require_permission(actor, Permission::DestinationSoftDelete)
    }

    fn can_restore(&self, actor: &Actor, _existing: &Destination) -> Result<(), Error> {
        require_permission(actor, Permission::DestinationRestore)
    }

    fn can_hard_delete(&self, actor: &Actor, _existing: &Destination) -> Result<(), Error> {
        require_permission(actor, Permission::DestinationHardDelete)
    }

    fn can_view(&self, actor: &Actor, entity: &Destination) -> Result<(), Error> {
        if entity.visibility == Visibility::Public {
            Ok(())
        } else {
            require_permission(actor, Permission::DestinationViewPrivate)
        }
    }

    fn can_search(&self, _actor: &Actor) -> Result<(), Error> {
        Ok(())
    }

    fn can_count(&self, _actor: &Actor) -> Result<(), Error> {
        Ok(())
    }
}

/// Slug allocation and visibility scoping.
#[derive(Debug, Default, Clone, Copy)]
pub struct DestinationHooks;

impl DestinationHooks {
    fn scope_visibility(
        actor: &Actor,
        mut criteria: SearchCriteria<DestinationFilters>,
    ) -> Result<SearchCriteria<DestinationFilters>, HookError> {
        if may_see_hidden(actor) {
            return Ok(criteria);
        }
        match criteria.filters.visibility {
            None | Some(Visibility::Public) => {
                criteria.filters.visibility = Some(Visibility::Public);
                Ok(criteria)
            }
            Some(_) => Err(HookError::Rejected(Error::forbidden())),
        }
    }
}

#[async_trait]
impl EntityHooks<DestinationSchema> for DestinationHooks {
    async fn before_create(
        &self,
        ctx: &HookContext<'_, DestinationSchema>,
        mut record: NewDestination,
    ) -> Result<NewDestination, HookError> {
        if record.slug_requested {
            return Ok(record);
        }
        let base = record.slug.clone();
        let mut candidate = base.clone();
        for attempt in 2..=SLUG_ATTEMPTS + 1 {
            if ctx.repository.find_one("slug", &candidate).await?.is_none() {
                record.slug = candidate;
                return Ok(record);
            }
            candidate = with_suffix(&base, attempt);
        }
        Err(HookError::Rejected(Error::already_exists(format!(
            "no free slug derived from {base}"
        ))))
    }

    async fn before_search(
        &self,
        ctx: &HookContext<'_, DestinationSchema>,
        criteria: SearchCriteria<DestinationFilters>,
    ) -> Result<SearchCriteria<DestinationFilters>, HookError> {
        Self::scope_visibility(ctx.actor, criteria)
    }

    async fn before_count(
        &self,
        ctx: &HookContext<'_, DestinationSchema>,
        criteria: SearchCriteria<DestinationFilters>,
    ) -> Result<SearchCriteria<DestinationFilters>, HookError> {
        Self::scope_visibility(ctx.actor, criteria)
    }
}

/// Pipeline configuration for destinations over `repository`.
pub fn destination_config(
    repository: Arc<dyn EntityRepository<DestinationSchema>>,
) -> EntityConfig<DestinationSchema> {
    EntityConfig {
        schema: DestinationSchema,
        policy: Arc::new(DestinationPolicy),
        hooks: Arc::new(DestinationHooks),
        repository,
    }
}
