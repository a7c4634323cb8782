//! Response envelopes shared by every endpoint.
//!
//! Success: `{ "success": true, "data": …, "metadata": { "timestamp", "traceId"?, "pagination"? } }`.
//! Failure: `{ "success": false, "error": { "code", "message", "details"?, "traceId"? } }`.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use pagination::PageMetadata;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Error, TraceId};

/// Metadata attached to successful responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Instant the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Request correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Paging details for search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub pagination: Option<PageMetadata>,
}

impl ResponseMetadata {
    /// Metadata stamped at `timestamp` with the ambient trace identifier.
    #[must_use]
    pub fn now(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            trace_id: TraceId::current().map(|id| id.to_string()),
            pagination: None,
        }
    }

    /// Attach paging details.
    #[must_use]
    pub fn with_pagination(mut self, pagination: PageMetadata) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Successful response body.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T> {
    success: bool,
    data: T,
    metadata: ResponseMetadata,
}

impl<T: Serialize> SuccessEnvelope<T> {
    /// Wrap `data`.
    pub fn new(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data,
            metadata,
        }
    }

    /// Render with `status`.
    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

/// Failed response body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailureEnvelope {
    #[schema(example = false)]
    success: bool,
    error: Error,
}

impl FailureEnvelope {
    /// Wrap an already redacted error.
    #[must_use]
    pub fn new(error: Error) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_timestamp;
    use pagination::PageRequest;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn success_envelope_shape() {
        let metadata = ResponseMetadata::now(fixture_timestamp())
            .with_pagination(PageMetadata::new(PageRequest::new(2, 5).expect("page"), 12));
        let body = serde_json::to_value(SuccessEnvelope::new(json!([1, 2]), metadata))
            .expect("serialise");
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!([1, 2]));
        assert_eq!(body["metadata"]["timestamp"], json!("2026-03-14T09:30:00Z"));
        assert_eq!(body["metadata"]["pagination"]["totalPages"], json!(3));
        assert!(body["metadata"].get("traceId").is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn metadata_picks_up_trace_id() {
        let id = TraceId::generate();
        let metadata = TraceId::scope(id, async { ResponseMetadata::now(fixture_timestamp()) }).await;
        assert_eq!(metadata.trace_id, Some(id.to_string()));
    }

    #[rstest]
    fn failure_envelope_shape() {
        let body = serde_json::to_value(FailureEnvelope::new(Error::forbidden())).expect("serialise");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("FORBIDDEN"));
    }
}
