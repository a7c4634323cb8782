//! [`MemoryBacked`] implementations for the concrete entities.

use crate::domain::amenity::{Amenity, AmenityPatch, AmenitySchema, NewAmenity};
use crate::domain::destination::{Destination, DestinationPatch, DestinationSchema, NewDestination};
use crate::domain::ports::SearchCriteria;
use crate::domain::user_account::{NewUserAccount, UserAccount, UserAccountPatch, UserAccountSchema};
use crate::domain::{AuditFields, EntityId, LifecycleState};

use super::{MemoryBacked, contains_folded};

fn query_hits(q: Option<&str>, fields: &[Option<&str>]) -> bool {
    q.is_none_or(|q| fields.iter().flatten().any(|field| contains_folded(field, q)))
}

impl MemoryBacked for AmenitySchema {
    fn materialize(id: EntityId, record: NewAmenity, audit: AuditFields) -> Amenity {
        Amenity {
            id,
            name: record.name,
            slug: record.slug,
            amenity_type: record.amenity_type,
            description: record.description,
            icon: record.icon,
            is_builtin: record.is_builtin,
            lifecycle_state: LifecycleState::Active,
            audit,
            extra: record.extra,
        }
    }

    fn apply_patch(entity: &mut Amenity, patch: AmenityPatch) {
        patch.apply(entity);
    }

    fn audit_mut(entity: &mut Amenity) -> &mut AuditFields {
        &mut entity.audit
    }

    fn set_lifecycle_state(entity: &mut Amenity, state: LifecycleState) {
        entity.lifecycle_state = state;
    }

    fn matches(entity: &Amenity, criteria: &SearchCriteria<Self::Filters>) -> bool {
        let filters = &criteria.filters;
        query_hits(
            criteria.q.as_deref(),
            &[Some(entity.name.as_str()), Some(entity.slug.as_str()), entity.description.as_deref()],
        ) && filters
            .amenity_type
            .is_none_or(|wanted| entity.amenity_type == wanted)
            && filters
                .is_builtin
                .is_none_or(|wanted| entity.is_builtin == wanted)
    }

    fn field_value<'a>(entity: &'a Amenity, field: &str) -> Option<&'a str> {
        match field {
            "slug" => Some(entity.slug.as_str()),
            "name" => Some(entity.name.as_str()),
            _ => None,
        }
    }

    fn unique_keys(entity: &Amenity) -> Vec<(&'static str, String)> {
        vec![("slug", entity.slug.clone())]
    }
}

impl MemoryBacked for DestinationSchema {
    fn materialize(id: EntityId, record: NewDestination, audit: AuditFields) -> Destination {
        Destination {
            id,
            name: record.name,
            slug: record.slug,
            summary: record.summary,
            country_code: record.country_code,
            visibility: record.visibility,
            lifecycle_state: LifecycleState::Active,
            audit,
            extra: record.extra,
        }
    }

    fn apply_patch(entity: &mut Destination, patch: DestinationPatch) {
        patch.apply(entity);
    }

    fn audit_mut(entity: &mut Destination) -> &mut AuditFields {
        &mut entity.audit
    }

    fn set_lifecycle_state(entity: &mut Destination, state: LifecycleState) {
        entity.lifecycle_state = state;
    }

    fn matches(entity: &Destination, criteria: &SearchCriteria<Self::Filters>) -> bool {
        let filters = &criteria.filters;
        query_hits(
            criteria.q.as_deref(),
            &[Some(entity.name.as_str()), Some(entity.slug.as_str()), entity.summary.as_deref()],
        ) && filters
            .visibility
            .is_none_or(|wanted| entity.visibility == wanted)
            && filters
                .country_code
                .as_deref()
                .is_none_or(|code| entity.country_code.eq_ignore_ascii_case(code.trim()))
    }

    fn field_value<'a>(entity: &'a Destination, field: &str) -> Option<&'a str> {
        match field {
            "slug" => Some(entity.slug.as_str()),
            "name" => Some(entity.name.as_str()),
            _ => None,
        }
    }

    fn unique_keys(entity: &Destination) -> Vec<(&'static str, String)> {
        vec![("slug", entity.slug.clone())]
    }
}

impl MemoryBacked for UserAccountSchema {
    fn materialize(id: EntityId, record: NewUserAccount, audit: AuditFields) -> UserAccount {
        UserAccount {
            id,
            display_name: record.display_name,
            email: record.email,
            role: record.role,
            lifecycle_state: LifecycleState::Active,
            audit,
            extra: record.extra,
        }
    }

    fn apply_patch(entity: &mut UserAccount, patch: UserAccountPatch) {
        patch.apply(entity);
    }

    fn audit_mut(entity: &mut UserAccount) -> &mut AuditFields {
        &mut entity.audit
    }

    fn set_lifecycle_state(entity: &mut UserAccount, state: LifecycleState) {
        entity.lifecycle_state = state;
    }

    fn matches(entity: &UserAccount, criteria: &SearchCriteria<Self::Filters>) -> bool {
        query_hits(
            criteria.q.as_deref(),
            &[Some(entity.display_name.as_str()), Some(entity.email.as_str())],
        ) && criteria
            .filters
            .role
            .is_none_or(|wanted| entity.role == wanted)
    }

    fn field_value<'a>(entity: &'a UserAccount, field: &str) -> Option<&'a str> {
        match field {
            "email" => Some(entity.email.as_str()),
            _ => None,
        }
    }

    fn unique_keys(entity: &UserAccount) -> Vec<(&'static str, String)> {
        vec![("email", entity.email.clone())]
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::amenity::{AmenityFilters, AmenityType};
    use crate::domain::destination::{DestinationFilters, Visibility};
    use crate::domain::{ActorId, AuditStamp, ExtraFields};
    use crate::test_support::fixture_timestamp;

    fn audit() -> AuditFields {
        AuditFields::created(&AuditStamp::new(
            ActorId::new("admin-1").expect("actor id"),
            fixture_timestamp(),
        ))
    }

    fn sauna() -> Amenity {
        AmenitySchema::materialize(
            EntityId::random(),
            NewAmenity {
                name: "Finnish Sauna".into(),
                slug: "finnish-sauna".into(),
                amenity_type: AmenityType::Outdoor,
                description: Some("Wood fired".into()),
                icon: None,
                is_builtin: true,
                extra: ExtraFields::new(),
            },
            audit(),
        )
    }

    #[rstest]
    #[case(None, AmenityFilters::default(), true)]
    #[case(Some("SAUNA"), AmenityFilters::default(), true)]
    #[case(Some("wood"), AmenityFilters::default(), true)]
    #[case(Some("pool"), AmenityFilters::default(), false)]
    #[case(None, AmenityFilters { amenity_type: Some(AmenityType::Kitchen), is_builtin: None }, false)]
    #[case(None, AmenityFilters { amenity_type: None, is_builtin: Some(true) }, true)]
    fn amenity_matching(
        #[case] q: Option<&str>,
        #[case] filters: AmenityFilters,
        #[case] expected: bool,
    ) {
        let criteria = SearchCriteria {
            q: q.map(str::to_owned),
            lifecycle_state: None,
            filters,
        };
        assert_eq!(AmenitySchema::matches(&sauna(), &criteria), expected);
    }

    #[rstest]
    fn destination_country_filter_ignores_case() {
        let lisbon = DestinationSchema::materialize(
            EntityId::random(),
            NewDestination {
                name: "Lisbon".into(),
                slug: "lisbon".into(),
                slug_requested: false,
                summary: None,
                country_code: "PT".into(),
                visibility: Visibility::Public,
                extra: ExtraFields::new(),
            },
            audit(),
        );
        let criteria = SearchCriteria {
            q: None,
            lifecycle_state: None,
            filters: DestinationFilters {
                visibility: None,
                country_code: Some("pt".into()),
            },
        };
        assert!(DestinationSchema::matches(&lisbon, &criteria));
    }
}
