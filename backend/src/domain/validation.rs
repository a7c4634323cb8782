//! Input schema validation shared by every entity.
//!
//! Raw payloads are parsed into typed inputs with serde and then checked with
//! [`Validate`]. Both steps report failures as `VALIDATION_ERROR` carrying
//! field-level issues under `details.issues`.
//!
//! Keys an input does not declare are collected into [`ExtraFields`] and
//! carried through to the stored entity, minus the audit keys the pipeline
//! owns.

use serde::{Deserialize, Deserializer, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::Error;
use super::slug::is_valid_slug;

/// One field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Field name in wire casing.
    pub field: String,
    /// Stable machine-readable issue code, e.g. `too_short`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Accumulated validation issues for one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: Vec<FieldIssue>,
}

impl ValidationErrors {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue.
    pub fn push(&mut self, field: impl Into<String>, code: &'static str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.into(),
            code,
            message: message.into(),
        });
    }

    /// Recorded issues.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one issue was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Check a required text field: trimmed length within `min..=max` chars.
    pub fn check_text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let length = value.trim().chars().count();
        if length < min {
            if min <= 1 {
                self.push(field, "required", format!("{field} must not be empty"));
            } else {
                self.push(field, "too_short", format!("{field} must be at least {min} characters"));
            }
        } else if length > max {
            self.push(field, "too_long", format!("{field} must be at most {max} characters"));
        }
    }

    /// Check an optional text field when present.
    pub fn check_optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|text| text.trim().chars().count() > max) {
            self.push(field, "too_long", format!("{field} must be at most {max} characters"));
        }
    }

    /// Check an optional slug when present.
    pub fn check_optional_slug(&mut self, field: &str, value: Option<&str>) {
        if value.is_some_and(|slug| !is_valid_slug(slug)) {
            self.push(
                field,
                "invalid_slug",
                format!("{field} may only contain lowercase letters, digits, and hyphens"),
            );
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(value: ValidationErrors) -> Self {
        let message = match value.issues.as_slice() {
            [only] => only.message.clone(),
            _ => "input failed validation".to_owned(),
        };
        Error::validation(message).with_details(json!({ "issues": value.issues }))
    }
}

/// Schema check for a typed input.
pub trait Validate {
    /// Verify field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns every issue found.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Parse `payload` into `T` and run its [`Validate`] checks.
///
/// # Errors
///
/// Returns a `VALIDATION_ERROR` when the payload has the wrong shape or fails
/// field constraints.
pub fn parse_input<T>(payload: Value) -> Result<T, Error>
where
    T: DeserializeOwned + Validate,
{
    if !payload.is_object() {
        return Err(Error::validation("payload must be a JSON object"));
    }
    let input: T = serde_json::from_value(payload).map_err(|err| {
        Error::validation(format!("payload is malformed: {err}")).with_details(json!({
            "issues": [{ "field": null, "code": "malformed", "message": err.to_string() }],
        }))
    })?;
    input.validate().map_err(Error::from)?;
    Ok(input)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBool {
    Bool(bool),
    Text(String),
}

/// Accept `true`/`false` as JSON booleans or query-string text.
///
/// # Errors
///
/// Fails for any other value.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawBool>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawBool::Bool(value)) => Ok(Some(value)),
        Some(RawBool::Text(text)) => match text.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {other:?}"
            ))),
        },
    }
}

/// Undeclared payload keys, stored alongside an entity's declared fields.
pub type ExtraFields = Map<String, Value>;

/// Keys only the pipeline may write. Callers supplying them are ignored.
pub const PIPELINE_FIELDS: &[&str] = &[
    "id",
    "lifecycleState",
    "createdAt",
    "createdById",
    "updatedAt",
    "updatedById",
    "deletedAt",
    "deletedById",
];

/// Drop pipeline-owned keys from caller-supplied extras.
#[must_use]
pub fn passthrough(mut extra: ExtraFields) -> ExtraFields {
    for key in PIPELINE_FIELDS {
        extra.remove(*key);
    }
    extra
}

/// Overlay `patch` onto `extra`, key by key.
pub fn merge_extra(extra: &mut ExtraFields, patch: ExtraFields) {
    extra.extend(patch);
}

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Pair with `#[serde(default)]`.
///
/// # Errors
///
/// Fails when the value is neither `null` nor a valid `T`.
pub fn explicit<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Normalise a clearable text field from an update.
///
/// Absent stays absent; `null` or blank text clears; anything else is trimmed.
#[must_use]
pub fn normalize_clearable_text(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(normalize_optional_text)
}

/// Trim optional text, dropping values that become empty.
#[must_use]
pub fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            errors.check_text("name", &self.name, 1, 5);
            errors.into_result()
        }
    }

    #[rstest]
    #[case(json!({"name": ""}), "required")]
    #[case(json!({"name": "   "}), "required")]
    #[case(json!({"name": "toolong"}), "too_long")]
    fn field_checks_report_issue_codes(#[case] payload: Value, #[case] code: &str) {
        let err = parse_input::<Named>(payload).expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::ValidationError);
        let details = err.details().expect("details");
        assert_eq!(details["issues"][0]["field"], json!("name"));
        assert_eq!(details["issues"][0]["code"], json!(code));
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"name": 7}))]
    #[case(json!(["name"]))]
    #[case(Value::Null)]
    fn malformed_payloads_are_validation_errors(#[case] payload: Value) {
        let err = parse_input::<Named>(payload).expect_err("malformed");
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[derive(Debug, Deserialize)]
    struct Open {
        name: String,
        #[serde(flatten)]
        extra: ExtraFields,
    }

    impl Validate for Open {
        fn validate(&self) -> Result<(), ValidationErrors> {
            Ok(())
        }
    }

    #[rstest]
    fn undeclared_keys_pass_through_without_audit_keys() {
        let input: Open = parse_input(json!({
            "name": "Wifi",
            "bandwidthMbps": 300,
            "createdById": "other-user",
            "lifecycleState": "INACTIVE",
        }))
        .expect("valid");
        assert_eq!(input.name, "Wifi");
        let extra = passthrough(input.extra);
        assert_eq!(extra.get("bandwidthMbps"), Some(&json!(300)));
        assert!(extra.get("createdById").is_none());
        assert!(extra.get("lifecycleState").is_none());
    }

    #[rstest]
    fn merge_overlays_keys() {
        let mut extra = ExtraFields::new();
        extra.insert("floor".into(), json!(2));
        extra.insert("view".into(), json!("sea"));
        let mut patch = ExtraFields::new();
        patch.insert("floor".into(), json!(3));
        merge_extra(&mut extra, patch);
        assert_eq!(Value::Object(extra), json!({ "floor": 3, "view": "sea" }));
    }

    #[derive(Debug, Default, Deserialize)]
    struct Clearable {
        #[serde(default, deserialize_with = "explicit")]
        note: Option<Option<String>>,
    }

    #[rstest]
    #[case(json!({}), None)]
    #[case(json!({ "note": null }), Some(None))]
    #[case(json!({ "note": "  " }), Some(None))]
    #[case(json!({ "note": " hi " }), Some(Some("hi".to_owned())))]
    fn clearable_text_separates_absent_from_cleared(
        #[case] raw: Value,
        #[case] expected: Option<Option<String>>,
    ) {
        let input: Clearable = serde_json::from_value(raw).expect("clearable");
        assert_eq!(normalize_clearable_text(input.note), expected);
    }

    #[derive(Debug, Deserialize)]
    struct Flag {
        #[serde(default, deserialize_with = "lenient_bool")]
        on: Option<bool>,
    }

    #[rstest]
    #[case(json!({"on": true}), Some(true))]
    #[case(json!({"on": "false"}), Some(false))]
    #[case(json!({"on": "1"}), Some(true))]
    #[case(json!({}), None)]
    fn lenient_bool_accepts_query_text(#[case] raw: Value, #[case] expected: Option<bool>) {
        let flag: Flag = serde_json::from_value(raw).expect("flag");
        assert_eq!(flag.on, expected);
    }

    #[rstest]
    fn lenient_bool_rejects_other_text() {
        assert!(serde_json::from_value::<Flag>(json!({"on": "maybe"})).is_err());
    }

    #[rstest]
    fn optional_text_normalises_blank_to_none() {
        assert_eq!(normalize_optional_text(Some("  ".to_owned())), None);
        assert_eq!(
            normalize_optional_text(Some(" hi ".to_owned())),
            Some("hi".to_owned())
        );
    }
}
