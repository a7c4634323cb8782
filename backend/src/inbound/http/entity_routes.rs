//! Generic CRUD and search routes.
//!
//! [`entity_scope`] mounts the same set of routes for any entity whose
//! service is reachable through [`ServiceRegistry`]. Handlers only translate
//! between HTTP and the service; every rule lives in the domain pipeline.

use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Scope, web};
use pagination::PageMetadata;
use serde_json::{Map, Value};

use crate::domain::service::requested_page;
use crate::domain::{EntitySchema, EntityService};

use super::ApiResult;
use super::auth::RequestActor;
use super::envelope::{ResponseMetadata, SuccessEnvelope};
use super::state::{HttpState, ServiceRegistry};

/// Build the route scope for `S` mounted at `path`.
///
/// Fixed segments (`/count`, `/slug/…`, `/by/…`) are registered ahead of
/// `/{id}` so they are never captured as identifiers.
pub fn entity_scope<S>(path: &str) -> Scope
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    web::scope(path)
        .route("", web::post().to(create::<S>))
        .route("", web::get().to(search::<S>))
        .route("/count", web::get().to(count::<S>))
        .route("/slug/{slug}", web::get().to(get_by_slug::<S>))
        .route("/by/{field}/{value}", web::get().to(get_by_field::<S>))
        .route("/{id}", web::get().to(get_by_id::<S>))
        .route("/{id}", web::put().to(update::<S>))
        .route("/{id}", web::delete().to(soft_delete::<S>))
        .route("/{id}/restore", web::post().to(restore::<S>))
        .route("/{id}/hard", web::delete().to(hard_delete::<S>))
}

fn service_of<S>(state: &HttpState) -> &EntityService<S>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    <HttpState as ServiceRegistry<S>>::service(state)
}

fn ok<T: serde::Serialize>(state: &HttpState, status: StatusCode, data: T) -> HttpResponse {
    SuccessEnvelope::new(data, ResponseMetadata::now(state.clock.utc())).respond(status)
}

/// Query-string pairs as the flat parameter object the service expects.
fn query_object(query: BTreeMap<String, String>) -> Value {
    Value::Object(
        query
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect::<Map<_, _>>(),
    )
}

async fn create<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state)
        .create(actor.actor(), payload.into_inner())
        .await?;
    Ok(ok(&state, StatusCode::CREATED, entity))
}

async fn search<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    query: web::Query<BTreeMap<String, String>>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let params = query_object(query.into_inner());
    let request = requested_page(&params)?;
    let page = service_of::<S>(&state).search(actor.actor(), params).await?;
    let metadata = ResponseMetadata::now(state.clock.utc())
        .with_pagination(PageMetadata::new(request, page.total));
    Ok(SuccessEnvelope::new(page.items, metadata).respond(StatusCode::OK))
}

async fn count<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    query: web::Query<BTreeMap<String, String>>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let result = service_of::<S>(&state)
        .count(actor.actor(), query_object(query.into_inner()))
        .await?;
    Ok(ok(&state, StatusCode::OK, result))
}

async fn get_by_slug<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    slug: web::Path<String>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state)
        .get_by_slug(actor.actor(), &slug)
        .await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn get_by_field<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let (field, value) = path.into_inner();
    let entity = service_of::<S>(&state)
        .get_by_field(actor.actor(), &field, &value)
        .await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn get_by_id<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    id: web::Path<String>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state).get_by_id(actor.actor(), &id).await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn update<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    id: web::Path<String>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state)
        .update(actor.actor(), &id, payload.into_inner())
        .await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn soft_delete<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    id: web::Path<String>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state)
        .soft_delete(actor.actor(), &id)
        .await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn restore<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    id: web::Path<String>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let entity = service_of::<S>(&state).restore(actor.actor(), &id).await?;
    Ok(ok(&state, StatusCode::OK, entity))
}

async fn hard_delete<S>(
    state: web::Data<HttpState>,
    actor: RequestActor,
    id: web::Path<String>,
) -> ApiResult<HttpResponse>
where
    S: EntitySchema,
    HttpState: ServiceRegistry<S>,
{
    let receipt = service_of::<S>(&state)
        .hard_delete(actor.actor(), &id)
        .await?;
    Ok(ok(&state, StatusCode::OK, receipt))
}
