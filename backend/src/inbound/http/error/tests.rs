//! Tests for HTTP error mapping.

use super::*;
use actix_web::body::to_bytes;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[fixture]
fn internal_error() -> Error {
    Error::internal("pool checkout timed out")
        .with_trace_id(TRACE_ID)
        .with_details(json!({ "secret": "x" }))
}

async fn body_of(error: &Error) -> (StatusCode, Option<String>, Value) {
    let response = ResponseError::error_response(error);
    let status = response.status();
    let header = response
        .headers()
        .get(TRACE_ID_HEADER)
        .map(|value| value.to_str().expect("ascii header").to_owned());
    let bytes = to_bytes(response.into_body()).await.expect("body");
    let body = serde_json::from_slice(&bytes).expect("json body");
    (status, header, body)
}

#[rstest]
#[case(Error::validation("bad"), StatusCode::BAD_REQUEST)]
#[case(Error::unauthorized("no token"), StatusCode::UNAUTHORIZED)]
#[case(Error::forbidden(), StatusCode::FORBIDDEN)]
#[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
#[case(Error::already_exists("taken"), StatusCode::CONFLICT)]
#[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
#[case(Error::not_implemented("no slug"), StatusCode::NOT_IMPLEMENTED)]
fn status_code_matches_error_code(#[case] error: Error, #[case] expected: StatusCode) {
    assert_eq!(ResponseError::status_code(&error), expected);
}

#[rstest]
#[actix_web::test]
async fn internal_errors_are_redacted(internal_error: Error) {
    let (status, header, body) = body_of(&internal_error).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header.as_deref(), Some(TRACE_ID));
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["message"], json!("Internal server error"));
    assert_eq!(body["error"]["traceId"], json!(TRACE_ID));
    assert!(body["error"].get("details").is_none());
}

#[rstest]
#[actix_web::test]
async fn validation_details_are_kept() {
    let error = Error::validation("name must not be empty")
        .with_details(json!({ "issues": [{ "field": "name", "code": "required" }] }));
    let (status, header, body) = body_of(&error).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(header.is_none());
    assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
    assert_eq!(body["error"]["details"]["issues"][0]["field"], json!("name"));
}
