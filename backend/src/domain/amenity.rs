//! Amenity entity: features a property can offer, such as Wifi or a pool.
//!
//! Writes require the matching `AMENITY_*` permission. Amenities are public
//! reference data, so view, search and count are open to every actor.
//!
//! Undeclared payload keys, such as `bandwidthMbps`, are stored and returned
//! as-is.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::ports::EntityRepository;
use crate::domain::validation::{
    explicit, lenient_bool, merge_extra, normalize_clearable_text, normalize_optional_text,
    passthrough,
};
use crate::domain::{
    Actor, AuditFields, EntityConfig, EntityId, EntityPolicy, EntityRecord, EntitySchema, Error,
    ExtraFields, LifecycleState, NoHooks, Permission, Validate, ValidationErrors,
    require_permission, slugify,
};

/// Longest amenity name.
pub const NAME_MAX: usize = 100;
/// Longest amenity description.
pub const DESCRIPTION_MAX: usize = 500;
/// Longest icon identifier.
pub const ICON_MAX: usize = 100;

/// Amenity category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmenityType {
    /// Uncategorised.
    #[default]
    General,
    /// Cooking facilities.
    Kitchen,
    /// Gardens, terraces, pools.
    Outdoor,
    /// Step-free access and similar.
    Accessibility,
    /// Smoke alarms, first aid.
    Safety,
    /// Television, games.
    Entertainment,
    /// Cleaning, concierge.
    Services,
}

impl AmenityType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Kitchen => "KITCHEN",
            Self::Outdoor => "OUTDOOR",
            Self::Accessibility => "ACCESSIBILITY",
            Self::Safety => "SAFETY",
            Self::Entertainment => "ENTERTAINMENT",
            Self::Services => "SERVICES",
        }
    }
}

impl FromStr for AmenityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERAL" => Ok(Self::General),
            "KITCHEN" => Ok(Self::Kitchen),
            "OUTDOOR" => Ok(Self::Outdoor),
            "ACCESSIBILITY" => Ok(Self::Accessibility),
            "SAFETY" => Ok(Self::Safety),
            "ENTERTAINMENT" => Ok(Self::Entertainment),
            "SERVICES" => Ok(Self::Services),
            other => Err(format!("unknown amenity type {other:?}")),
        }
    }
}

/// Persisted amenity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenity {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Unique URL-safe key derived from the name unless supplied.
    pub slug: String,
    /// Category.
    #[serde(rename = "type")]
    pub amenity_type: AmenityType,
    /// Optional longer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional icon identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Shipped with the platform rather than created by a tenant.
    pub is_builtin: bool,
    /// Lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Audit trail.
    #[serde(flatten)]
    pub audit: AuditFields,
    /// Undeclared keys supplied by callers.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl EntityRecord for Amenity {
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

/// Create payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAmenity {
    /// Display name.
    pub name: String,
    /// Category; defaults to `GENERAL`.
    #[serde(default, rename = "type")]
    pub amenity_type: AmenityType,
    /// Explicit slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Longer text.
    #[serde(default)]
    pub description: Option<String>,
    /// Icon identifier.
    #[serde(default)]
    pub icon: Option<String>,
    /// Platform-provided flag.
    #[serde(default)]
    pub is_builtin: bool,
    /// Undeclared keys.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Validate for CreateAmenity {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", &self.name, 1, NAME_MAX);
        errors.check_optional_slug("slug", self.slug.as_deref());
        errors.check_optional_text("description", self.description.as_deref(), DESCRIPTION_MAX);
        errors.check_optional_text("icon", self.icon.as_deref(), ICON_MAX);
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
pub struct UpdateAmenity {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New category.
    #[serde(default, rename = "type")]
    pub amenity_type: Option<AmenityType>,
    /// New slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// New description; `null` or blank clears it.
    #[serde(default, deserialize_with = "explicit")]
    pub description: Option<Option<String>>,
    /// New icon; `null` or blank clears it.
    #[serde(default, deserialize_with = "explicit")]
    pub icon: Option<Option<String>>,
    /// New platform-provided flag.
    #[serde(default)]
    pub is_builtin: Option<bool>,
    /// Undeclared keys to overlay.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Validate for UpdateAmenity {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.check_text("name", name, 1, NAME_MAX);
        }
        errors.check_optional_slug("slug", self.slug.as_deref());
        errors.check_optional_text(
            "description",
            self.description.as_ref().and_then(Option::as_deref),
            DESCRIPTION_MAX,
        );
        errors.check_optional_text("icon", self.icon.as_ref().and_then(Option::as_deref), ICON_MAX);
        errors.into_result()
    }
}

/// Search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityFilters {
    /// Category.
    #[serde(default, rename = "type")]
    pub amenity_type: Option<AmenityType>,
    /// Platform-provided flag.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_builtin: Option<bool>,
}

impl Validate for AmenityFilters {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// Normalised create fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAmenity {
    /// Trimmed name.
    pub name: String,
    /// Final slug.
    pub slug: String,
    /// Category.
    pub amenity_type: AmenityType,
    /// Trimmed description.
    pub description: Option<String>,
    /// Trimmed icon.
    pub icon: Option<String>,
    /// Platform-provided flag.
    pub is_builtin: bool,
    /// Undeclared keys, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

/// Normalised update fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmenityPatch {
    /// Trimmed name.
    pub name: Option<String>,
    /// Slug.
    pub slug: Option<String>,
    /// Category.
    pub amenity_type: Option<AmenityType>,
    /// Trimmed description; `Some(None)` clears.
    pub description: Option<Option<String>>,
    /// Trimmed icon; `Some(None)` clears.
    pub icon: Option<Option<String>>,
    /// Platform-provided flag.
    pub is_builtin: Option<bool>,
    /// Undeclared keys to overlay, minus pipeline-owned ones.
    pub extra: ExtraFields,
}

impl AmenityPatch {
    /// Apply to a record.
    pub fn apply(self, amenity: &mut Amenity) {
        if let Some(name) = self.name {
            amenity.name = name;
        }
        if let Some(slug) = self.slug {
            amenity.slug = slug;
        }
        if let Some(amenity_type) = self.amenity_type {
            amenity.amenity_type = amenity_type;
        }
        if let Some(description) = self.description {
            amenity.description = description;
        }
        if let Some(icon) = self.icon {
            amenity.icon = icon;
        }
        if let Some(is_builtin) = self.is_builtin {
            amenity.is_builtin = is_builtin;
        }
        merge_extra(&mut amenity.extra, self.extra);
    }
}

/// Amenity types and normalisers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmenitySchema;

impl EntitySchema for AmenitySchema {
    type Entity = Amenity;
    type Create = CreateAmenity;
    type Update = UpdateAmenity;
    type Filters = AmenityFilters;
    type NewRecord = NewAmenity;
    type Patch = AmenityPatch;

    const NAME: &'static str = "amenity";
    const LOOKUP_FIELDS: &'static [&'static str] = &["slug", "name"];

    fn normalize_create(&self, input: CreateAmenity) -> NewAmenity {
        let name = input.name.trim().to_owned();
        let slug = input
            .slug
            .or_else(|| slugify(&name))
            .unwrap_or_default();
        NewAmenity {
            name,
            slug,
            amenity_type: input.amenity_type,
            description: normalize_optional_text(input.description),
            icon: normalize_optional_text(input.icon),
            is_builtin: input.is_builtin,
            extra: passthrough(input.extra),
        }
    }

    fn normalize_update(&self, input: UpdateAmenity) -> AmenityPatch {
        AmenityPatch {
            name: input.name.map(|name| name.trim().to_owned()),
            slug: input.slug,
            amenity_type: input.amenity_type,
            description: normalize_clearable_text(input.description),
            icon: normalize_clearable_text(input.icon),
            is_builtin: input.is_builtin,
            extra: passthrough(input.extra),
        }
    }
}

/// Amenity authorisation: permission per write, public reads.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmenityPolicy;

impl EntityPolicy<AmenitySchema> for AmenityPolicy {
    fn can_create(&self, actor: &Actor, _input: &CreateAmenity) -> Result<(), Error> {
        require_permission(actor, Permission::AmenityCreate)
    }

    fn can_update(
        &self,
        actor: &Actor,
        _existing: &Amenity,
        _input: &UpdateAmenity,
    ) -> Result<(), Error> {
        require_permission(actor, Permission::AmenityUpdate)
    }

    fn can_soft_delete(&self, actor: &Actor, _existing: &Amenity) -> Result<(), Error> {
        require_permission(actor, Permission::AmenitySoftDelete)
    }

    fn can_restore(&self, actor: &Actor, _existing: &Amenity) -> Result<(), Error> {
        require_permission(actor, Permission::AmenityRestore)
    }

    fn can_hard_delete(&self, actor: &Actor, _existing: &Amenity) -> Result<(), Error> {
        require_permission(actor, Permission::AmenityHardDelete)
    }

    fn can_view(&self, _actor: &Actor, _entity: &Amenity) -> Result<(), Error> {
        Ok(())
    }

    fn can_search(&self, _actor: &Actor) -> Result<(), Error> {
        Ok(())
    }

    fn can_count(&self, _actor: &Actor) -> Result<(), Error> {
        Ok(())
    }
}

/// Pipeline configuration for amenities over `repository`.
pub fn amenity_config(
    repository: Arc<dyn EntityRepository<AmenitySchema>>,
) -> EntityConfig<AmenitySchema> {
    EntityConfig {
        schema: AmenitySchema,
        policy: Arc::new(AmenityPolicy),
        hooks: Arc::new(NoHooks),
        repository,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, parse_input};
    use rstest::rstest;
    use serde_json::{Value, json};

    fn normalise(payload: Value) -> NewAmenity {
        let input: CreateAmenity = parse_input(payload).expect("valid amenity");
        AmenitySchema.normalize_create(input)
    }

    #[rstest]
    fn defaults_type_and_derives_slug() {
        let record = normalise(json!({ "name": "  Free Wifi " }));
        assert_eq!(record.name, "Free Wifi");
        assert_eq!(record.slug, "free-wifi");
        assert_eq!(record.amenity_type, AmenityType::General);
        assert!(!record.is_builtin);
    }

    #[rstest]
    fn explicit_slug_wins() {
        let record = normalise(json!({ "name": "Wifi", "slug": "wireless" }));
        assert_eq!(record.slug, "wireless");
    }

    #[rstest]
    fn normalisation_is_deterministic() {
        let payload = json!({ "name": "Pool", "type": "OUTDOOR", "description": " heated " });
        assert_eq!(normalise(payload.clone()), normalise(payload));
    }

    #[rstest]
    #[case(json!({ "name": "" }), "name")]
    #[case(json!({ "name": "x".repeat(NAME_MAX + 1) }), "name")]
    #[case(json!({ "name": "***" }), "name")]
    #[case(json!({ "name": "Wifi", "slug": "Not A Slug" }), "slug")]
    #[case(json!({ "name": "Wifi", "description": "d".repeat(DESCRIPTION_MAX + 1) }), "description")]
    fn invalid_payloads_name_the_field(#[case] payload: Value, #[case] field: &str) {
        let err = parse_input::<CreateAmenity>(payload).expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.details().expect("details")["issues"][0]["field"], json!(field));
    }

    #[rstest]
    fn unknown_type_is_rejected() {
        let err = parse_input::<CreateAmenity>(json!({ "name": "Wifi", "type": "SPACESHIP" }))
            .expect_err("bad type");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[rstest]
    fn patch_only_touches_supplied_fields() {
        let input: UpdateAmenity = parse_input(json!({ "icon": "wifi" })).expect("valid");
        let patch = AmenitySchema.normalize_update(input);
        assert_eq!(
            patch,
            AmenityPatch {
                icon: Some(Some("wifi".to_owned())),
                ..AmenityPatch::default()
            }
        );
    }

    #[rstest]
    fn blank_description_clears_it() {
        let input: UpdateAmenity =
            parse_input(json!({ "description": "", "icon": null })).expect("valid");
        let patch = AmenitySchema.normalize_update(input);
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.icon, Some(None));
        assert_eq!(patch.name, None);
    }

    #[rstest]
    fn extra_keys_survive_normalisation() {
        let record = normalise(json!({
            "name": "Wifi",
            "bandwidthMbps": 300,
            "createdById": "intruder",
            "id": "not-yours",
        }));
        assert_eq!(record.extra.get("bandwidthMbps"), Some(&json!(300)));
        assert!(record.extra.get("createdById").is_none());
        assert!(record.extra.get("id").is_none());
        assert!(record.extra.get("name").is_none());
    }

    #[rstest]
    fn serialises_type_under_wire_name() {
        let stamp = crate::domain::AuditStamp::new(
            crate::domain::ActorId::new("admin-1").expect("id"),
            crate::test_support::fixture_timestamp(),
        );
        let amenity = Amenity {
            id: EntityId::random(),
            name: "Wifi".into(),
            slug: "wifi".into(),
            amenity_type: AmenityType::General,
            description: None,
            icon: None,
            is_builtin: false,
            lifecycle_state: LifecycleState::Active,
            audit: AuditFields::created(&stamp),
            extra: ExtraFields::from_iter([("bandwidthMbps".to_owned(), json!(300))]),
        };
        let value = serde_json::to_value(&amenity).expect("serialise");
        assert_eq!(value["bandwidthMbps"], json!(300));
        let back: Amenity = serde_json::from_value(value.clone()).expect("deserialise");
        assert_eq!(back, amenity);
        assert_eq!(value["type"], json!("GENERAL"));
        assert_eq!(value["lifecycleState"], json!("ACTIVE"));
        assert_eq!(value["createdById"], json!("admin-1"));
        assert!(value.get("description").is_none());
    }

    #[rstest]
    fn filters_parse_query_text() {
        let filters: AmenityFilters =
            serde_json::from_value(json!({ "type": "KITCHEN", "isBuiltin": "true" }))
                .expect("filters");
        assert_eq!(filters.amenity_type, Some(AmenityType::Kitchen));
        assert_eq!(filters.is_builtin, Some(true));
    }
}
