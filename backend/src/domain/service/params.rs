//! Search and count parameters shared by every entity.
//!
//! Parameters arrive as a flat JSON object: `{ page?, pageSize?, q?,
//! lifecycleState?, ...filters }`. Query-string values are strings, so paging
//! numbers are parsed leniently.

use pagination::{PageParams, PageRequest};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::ports::SearchCriteria;
use crate::domain::{Error, LifecycleState, Validate, ValidationErrors, parse_input};

/// Longest accepted free-text query.
pub const QUERY_MAX: usize = 200;

/// Filter part of search and count parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaParams<F> {
    /// Free-text query.
    #[serde(default)]
    pub q: Option<String>,
    /// Lifecycle filter; omitted means `ACTIVE` only.
    #[serde(default)]
    pub lifecycle_state: Option<LifecycleState>,
    /// Entity-specific filters.
    #[serde(flatten)]
    pub filters: F,
}

impl<F: Validate> Validate for CriteriaParams<F> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_optional_text("q", self.q.as_deref(), QUERY_MAX);
        if let Err(filter_errors) = self.filters.validate() {
            for issue in filter_errors.issues() {
                errors.push(issue.field.clone(), issue.code, issue.message.clone());
            }
        }
        errors.into_result()
    }
}

impl<F> CriteriaParams<F> {
    /// Convert into repository criteria, trimming the free-text query.
    pub fn into_criteria(self) -> SearchCriteria<F> {
        SearchCriteria {
            q: self
                .q
                .map(|q| q.trim().to_owned())
                .filter(|q| !q.is_empty()),
            lifecycle_state: self.lifecycle_state,
            filters: self.filters,
        }
    }
}

/// Paging plus criteria.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams<F> {
    /// Raw paging values.
    #[serde(flatten)]
    pub page: PageParams,
    /// Filters.
    #[serde(flatten)]
    pub criteria: CriteriaParams<F>,
}

impl<F: Validate> Validate for SearchParams<F> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.criteria.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if let Err(err) = PageRequest::try_from(self.page) {
            errors.push(err.field(), "out_of_range", err.to_string());
        }
        errors.into_result()
    }
}

impl<F> SearchParams<F> {
    /// Split into a validated window and repository criteria.
    ///
    /// # Errors
    ///
    /// Returns `VALIDATION_ERROR` when paging is out of range.
    pub fn into_parts(self) -> Result<(PageRequest, SearchCriteria<F>), Error> {
        let request = page_request(self.page)?;
        Ok((request, self.criteria.into_criteria()))
    }
}

fn page_request(params: PageParams) -> Result<PageRequest, Error> {
    PageRequest::try_from(params).map_err(|err| {
        let mut errors = ValidationErrors::new();
        errors.push(err.field(), "out_of_range", err.to_string());
        Error::from(errors)
    })
}

/// Read the page window out of raw search parameters.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for malformed or out-of-range paging.
pub fn requested_page(params: &Value) -> Result<PageRequest, Error> {
    let raw: PageParams = serde_json::from_value(object_or_empty(params.clone()))
        .map_err(|err| Error::validation(format!("paging parameters are malformed: {err}")))?;
    page_request(raw)
}

/// Parse and validate search or count parameters.
///
/// `null` is treated as an empty object.
///
/// # Errors
///
/// Returns `VALIDATION_ERROR` for malformed parameters.
pub fn parse_params<T>(params: Value) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned + Validate,
{
    parse_input(object_or_empty(params))
}

fn object_or_empty(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug, Clone, Default, Deserialize)]
    struct TagFilters {
        #[serde(default)]
        tag: Option<String>,
    }

    impl Validate for TagFilters {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            errors.check_optional_text("tag", self.tag.as_deref(), 5);
            errors.into_result()
        }
    }

    #[rstest]
    fn query_string_values_parse_leniently() {
        let params: SearchParams<TagFilters> = parse_params(json!({
            "page": "2",
            "pageSize": "5",
            "q": "  pool ",
            "lifecycleState": "INACTIVE",
            "tag": "spa",
        }))
        .expect("valid params");
        let (request, criteria) = params.into_parts().expect("parts");
        assert_eq!((request.page(), request.page_size()), (2, 5));
        assert_eq!(criteria.q.as_deref(), Some("pool"));
        assert_eq!(criteria.lifecycle_state, Some(LifecycleState::Inactive));
        assert_eq!(criteria.filters.tag.as_deref(), Some("spa"));
    }

    #[rstest]
    #[case(json!({"page": 0}), "page")]
    #[case(json!({"pageSize": 101}), "pageSize")]
    #[case(json!({"tag": "too-long-tag"}), "tag")]
    fn out_of_range_values_are_field_issues(#[case] raw: Value, #[case] field: &str) {
        let err = parse_params::<SearchParams<TagFilters>>(raw).expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationError);
        let details = err.details().expect("details");
        assert_eq!(details["issues"][0]["field"], json!(field));
    }

    #[rstest]
    fn null_means_defaults() {
        let params: SearchParams<TagFilters> = parse_params(Value::Null).expect("defaults");
        let (request, criteria) = params.into_parts().expect("parts");
        assert_eq!(request, PageRequest::default());
        assert!(criteria.q.is_none());
    }

    #[rstest]
    fn blank_query_is_dropped() {
        let params: CriteriaParams<TagFilters> =
            parse_params(json!({"q": "   "})).expect("valid params");
        assert!(params.into_criteria().q.is_none());
    }

    #[rstest]
    fn requested_page_reads_window_only() {
        let request = requested_page(&json!({"page": 3, "q": "x"})).expect("page");
        assert_eq!(request.page(), 3);
    }
}
