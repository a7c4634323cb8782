//! Integration tests for `DieselAmenityRepository` against embedded PostgreSQL.
//!
//! Each test provisions its own migrated database, so uniqueness and ordering
//! assertions never see rows from another test.

use chrono::Duration;
use hospitality_backend::domain::amenity::{
    AmenityFilters, AmenityPatch, AmenityType, NewAmenity,
};
use hospitality_backend::domain::ports::{
    EntityRepository, EntityRepositoryError, SearchCriteria,
};
use hospitality_backend::domain::{
    ActorId, AuditStamp, EntityId, ExtraFields, LifecycleState, NewEntity,
};
use hospitality_backend::outbound::persistence::{DbPool, DieselAmenityRepository, PoolConfig};
use hospitality_backend::test_support::fixture_timestamp;
use pagination::PageRequest;
use pg_embedded_setup_unpriv::TemporaryDatabase;
use rstest::{fixture, rstest};
use serde_json::json;
use tokio::runtime::Runtime;

mod support;

use support::{handle_cluster_setup_failure, migrated_database};

struct TestContext {
    runtime: Runtime,
    repository: DieselAmenityRepository,
    _database: TemporaryDatabase,
}

fn setup_context() -> Result<TestContext, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let database = migrated_database(&runtime)?;
    let config = PoolConfig::new(database.url().to_string())
        .with_max_size(2)
        .with_min_idle(Some(1));
    let pool = runtime
        .block_on(DbPool::new(config))
        .map_err(|err| err.to_string())?;

    Ok(TestContext {
        runtime,
        repository: DieselAmenityRepository::new(pool),
        _database: database,
    })
}

#[fixture]
fn repo_context() -> Option<TestContext> {
    match setup_context() {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

fn stamp(minutes: i64) -> AuditStamp {
    AuditStamp::new(
        ActorId::new("admin-1").expect("actor id"),
        fixture_timestamp() + Duration::minutes(minutes),
    )
}

fn amenity(name: &str, slug: &str, minutes: i64) -> NewEntity<NewAmenity> {
    NewEntity {
        record: NewAmenity {
            name: name.to_owned(),
            slug: slug.to_owned(),
            amenity_type: AmenityType::General,
            description: Some(format!("{name} for guests")),
            icon: None,
            is_builtin: false,
            extra: ExtraFields::new(),
        },
        stamp: stamp(minutes),
    }
}

fn active() -> SearchCriteria<AmenityFilters> {
    SearchCriteria::default()
}

#[rstest]
fn duplicate_slug_is_reported_as_duplicate(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: duplicate_slug_is_reported_as_duplicate skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        repository
            .create(amenity("Wifi", "wifi", 0))
            .await
            .expect("first insert");
        let err = repository
            .create(amenity("WiFi 6", "wifi", 1))
            .await
            .expect_err("slug collision");
        assert!(
            matches!(err, EntityRepositoryError::Duplicate { .. }),
            "expected Duplicate, got {err:?}"
        );
        assert_eq!(repository.count(&active()).await.expect("count"), 1);
    });
}

#[rstest]
fn search_total_counts_every_match_beyond_the_window(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: search_total_counts_every_match_beyond_the_window skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        for index in 0..7 {
            repository
                .create(amenity(&format!("Room {index}"), &format!("room-{index}"), index))
                .await
                .expect("insert room");
        }
        repository
            .create(amenity("Pool_100%", "pool", 10))
            .await
            .expect("insert pool");

        let rooms = SearchCriteria {
            q: Some("ROOM".to_owned()),
            ..active()
        };
        let page = repository
            .find_all(&rooms, PageRequest::new(2, 3).expect("page"))
            .await
            .expect("search");
        assert_eq!(page.total, 7);
        let names: Vec<&str> = page.items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, ["Room 3", "Room 4", "Room 5"]);

        let literal = SearchCriteria {
            q: Some("_100%".to_owned()),
            ..active()
        };
        assert_eq!(repository.count(&literal).await.expect("count"), 1);
    });
}

#[rstest]
fn soft_delete_and_restore_round_trip(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: soft_delete_and_restore_round_trip skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        let wifi = repository
            .create(amenity("Wifi", "wifi", 0))
            .await
            .expect("insert");

        let deleted = repository
            .soft_delete(wifi.id, stamp(5))
            .await
            .expect("soft delete");
        assert_eq!(deleted.lifecycle_state, LifecycleState::Inactive);
        assert_eq!(deleted.audit.deleted_at, Some(stamp(5).at));
        assert_eq!(
            deleted.audit.deleted_by_id.as_ref().map(ActorId::as_str),
            Some("admin-1")
        );
        assert_eq!(repository.count(&active()).await.expect("count"), 0);
        let inactive = SearchCriteria {
            lifecycle_state: Some(LifecycleState::Inactive),
            ..active()
        };
        assert_eq!(repository.count(&inactive).await.expect("count"), 1);

        let restored = repository
            .restore(wifi.id, stamp(9))
            .await
            .expect("restore");
        assert_eq!(restored.lifecycle_state, LifecycleState::Active);
        assert_eq!(restored.audit.deleted_at, None);
        assert_eq!(restored.audit.deleted_by_id, None);
        assert_eq!(restored.audit.updated_at, stamp(9).at);
        assert_eq!(restored.audit.created_at, wifi.audit.created_at);
        assert_eq!(repository.count(&active()).await.expect("count"), 1);
    });
}

#[rstest]
fn extra_fields_persist_and_merge(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: extra_fields_persist_and_merge skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        let mut new = amenity("Wifi", "wifi", 0);
        new.record.extra.insert("bandwidthMbps".into(), json!(300));
        new.record.extra.insert("band".into(), json!("5GHz"));
        let wifi = repository.create(new).await.expect("insert");
        assert_eq!(wifi.extra.get("bandwidthMbps"), Some(&json!(300)));

        let patch = AmenityPatch {
            description: Some(None),
            extra: ExtraFields::from_iter([("bandwidthMbps".to_owned(), json!(1000))]),
            ..AmenityPatch::default()
        };
        let updated = repository
            .update(wifi.id, patch, stamp(3))
            .await
            .expect("update");
        assert_eq!(updated.description, None);
        assert_eq!(updated.extra.get("bandwidthMbps"), Some(&json!(1000)));
        assert_eq!(updated.extra.get("band"), Some(&json!("5GHz")));
        assert_eq!(updated.audit.updated_at, stamp(3).at);
    });
}

#[rstest]
fn hard_delete_reports_removed_rows(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: hard_delete_reports_removed_rows skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        let wifi = repository
            .create(amenity("Wifi", "wifi", 0))
            .await
            .expect("insert");
        assert_eq!(repository.hard_delete(wifi.id).await.expect("delete"), 1);
        assert_eq!(repository.hard_delete(wifi.id).await.expect("delete"), 0);
        assert!(
            repository
                .find_by_id(wifi.id)
                .await
                .expect("lookup")
                .is_none()
        );
        let err = repository
            .update(EntityId::random(), AmenityPatch::default(), stamp(1))
            .await
            .expect_err("missing row");
        assert!(matches!(err, EntityRepositoryError::Missing { .. }));
    });
}

#[rstest]
fn lookup_fields_match_exactly(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: lookup_fields_match_exactly skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        repository
            .create(amenity("Wifi", "wifi", 0))
            .await
            .expect("insert");
        let found = repository
            .find_one("slug", "wifi")
            .await
            .expect("lookup")
            .expect("row");
        assert_eq!(found.name, "Wifi");
        assert!(
            repository
                .find_one("name", "Pool")
                .await
                .expect("lookup")
                .is_none()
        );
        let err = repository
            .find_one("icon", "wifi")
            .await
            .expect_err("undeclared field");
        assert!(matches!(err, EntityRepositoryError::Query { .. }));
    });
}

#[rstest]
fn type_filter_narrows_search(repo_context: Option<TestContext>) {
    let Some(context) = repo_context else {
        eprintln!("SKIP-TEST-CLUSTER: type_filter_narrows_search skipped");
        return;
    };
    let repository = &context.repository;

    context.runtime.block_on(async {
        let mut kitchen = amenity("Oven", "oven", 0);
        kitchen.record.amenity_type = AmenityType::Kitchen;
        repository.create(kitchen).await.expect("insert oven");
        repository
            .create(amenity("Wifi", "wifi", 1))
            .await
            .expect("insert wifi");
        let criteria = SearchCriteria {
            filters: AmenityFilters {
                amenity_type: Some(AmenityType::Kitchen),
                is_builtin: None,
            },
            ..active()
        };
        let page = repository
            .find_all(&criteria, PageRequest::new(1, 20).expect("page"))
            .await
            .expect("search");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].slug, "oven");
    });
}
