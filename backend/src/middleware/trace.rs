//! Middleware installing a request-scoped [`TraceId`].
//!
//! A caller-supplied `Trace-Id` header is honoured when it holds a UUID;
//! otherwise a fresh identifier is generated. The identifier is stored in
//! task-local storage for the duration of the request, echoed in the
//! response header and recorded on a per-request tracing span.
//!
//! Task-locals do not follow spawned tasks; wrap such work in
//! [`TraceId::scope`].

use std::future::Future;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, error, info, info_span};

use crate::domain::TraceId;
use crate::domain::trace_id::TRACE_ID_HEADER;

/// Identifier for `req`: the inbound header when valid, else a new one.
fn inbound_trace_id(req: &ServiceRequest) -> TraceId {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or_else(TraceId::generate)
}

/// Attach a trace identifier to every request and response.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use hospitality_backend::middleware::Trace;
///
/// let _app = App::new().wrap(Trace);
/// ```
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

/// Service wrapper produced by [`Trace`].
pub struct TraceMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let trace_id = inbound_trace_id(&req);
        let span = info_span!(
            "http_request",
            trace_id = %trace_id,
            method = %req.method(),
            path = %req.path(),
        );
        let started = Instant::now();
        let fut = self.service.call(req);
        Box::pin(TraceId::scope(trace_id, attach_header(fut, trace_id, started)).instrument(span))
    }
}

async fn attach_header<F, B>(
    fut: F,
    trace_id: TraceId,
    started: Instant,
) -> Result<ServiceResponse<B>, Error>
where
    F: Future<Output = Result<ServiceResponse<B>, Error>>,
{
    let mut res = fut.await?;
    match HeaderValue::from_str(&trace_id.to_string()) {
        Ok(value) => {
            res.response_mut()
                .headers_mut()
                .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
        }
        Err(error) => {
            error!(%error, "failed to encode trace identifier header");
        }
    }
    info!(
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis(),
        "request completed"
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Error as DomainError;
    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    async fn call(request: test::TestRequest) -> (ServiceResponse, String) {
        let app = test::init_service(App::new().wrap(Trace).route(
            "/",
            web::get().to(|| async {
                let id = TraceId::current().expect("trace id in scope");
                HttpResponse::Ok().body(id.to_string())
            }),
        ))
        .await;
        let res = test::call_service(&app, request.uri("/").to_request()).await;
        let header = res
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("ascii header")
            .to_owned();
        (res, header)
    }

    #[rstest]
    #[actix_web::test]
    async fn handler_sees_the_echoed_identifier() {
        let (res, header) = call(test::TestRequest::get()).await;
        let body = test::read_body(res).await;
        assert_eq!(std::str::from_utf8(&body).expect("utf8"), header);
    }

    #[rstest]
    #[actix_web::test]
    async fn valid_inbound_identifier_is_reused() {
        let inbound = "6f1c1c8e-8a39-4c4e-9d0e-3c2f1b0a9e77";
        let (_, header) =
            call(test::TestRequest::get().insert_header((TRACE_ID_HEADER, inbound))).await;
        assert_eq!(header, inbound);
    }

    #[rstest]
    #[actix_web::test]
    async fn malformed_inbound_identifier_is_replaced() {
        let (_, header) =
            call(test::TestRequest::get().insert_header((TRACE_ID_HEADER, "not-a-uuid"))).await;
        assert!(header.parse::<TraceId>().is_ok());
    }

    #[rstest]
    #[actix_web::test]
    async fn errors_carry_the_request_identifier() {
        let app = test::init_service(App::new().wrap(Trace).route(
            "/",
            web::get().to(|| async {
                Err::<HttpResponse, DomainError>(DomainError::not_found("amenity not found"))
            }),
        ))
        .await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let header = res
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("ascii header")
            .to_owned();
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["traceId"], serde_json::json!(header));
    }
}
