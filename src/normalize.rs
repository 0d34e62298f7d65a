//! Response normalization.
//!
//! Every facade call passes its [`RawResponse`] through [`normalize`], the
//! one place where status codes are interpreted. The result is an
//! [`ApiOutcome`]: either a successful [`Payload`] or an [`ApiFailure`].
//!
//! Rules, applied in order:
//!
//! 1. 2xx whose body decodes as the expected type → `Payload::Typed`
//! 2. 204, or 2xx with an empty body → `Payload::Empty` (succeeded, nothing returned)
//! 3. 2xx whose body is JSON of another shape → `Payload::Raw(json)`;
//!    2xx whose body is not JSON at all → `Payload::Raw(string)`
//! 4. 401 → `Unauthorized`
//! 5. 404 → `NotFound`
//! 6. 422 → `ValidationError` with the field-level messages joined
//! 7. anything else → `Unknown` with `"<status> on <label>"`

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, RawResponse, Transport};

const EXCERPT_CHARS: usize = 200;

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unauthorized,
    NotFound,
    ValidationError,
    /// A payload was required but the server returned none.
    EmptySuccess,
    /// No response was obtained.
    TransportUnavailable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub kind: FailureKind,
    pub label: String,
    pub status: Option<u16>,
    pub message: String,
    /// Body excerpt, when the server sent one.
    pub detail: Option<String>,
}

impl ApiFailure {
    fn new(kind: FailureKind, label: &str, status: Option<u16>, message: String) -> Self {
        Self {
            kind,
            label: label.to_string(),
            status,
            message,
            detail: None,
        }
    }

    pub fn empty_success(label: &str) -> Self {
        Self::new(
            FailureKind::EmptySuccess,
            label,
            None,
            format!("{label} returned no content"),
        )
    }

    pub fn transport_unavailable(label: &str, cause: String) -> Self {
        Self::new(FailureKind::TransportUnavailable, label, None, cause)
    }

    /// Converts into the public error taxonomy.
    pub fn into_error(self) -> Error {
        match self.kind {
            FailureKind::Unauthorized => Error::Authentication(self.label),
            FailureKind::NotFound => Error::NotFound(self.label),
            FailureKind::ValidationError => Error::Validation(self.message),
            FailureKind::EmptySuccess => Error::UnexpectedResponse {
                label: self.label,
                message: "no content returned".to_string(),
            },
            FailureKind::TransportUnavailable => Error::Connection(self.message),
            FailureKind::Unknown => Error::UnknownApi {
                status: self.status.unwrap_or_default(),
                label: self.label,
                message: self.detail.unwrap_or_else(|| "no response body".to_string()),
            },
        }
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    /// Decoded into the expected type.
    Typed(T),
    /// Valid response that did not match the expected type.
    Raw(Value),
    /// The operation succeeded without returning anything.
    Empty,
}

impl<T: DeserializeOwned> Payload<T> {
    /// Returns the typed value, reconstructing it from a raw body if needed.
    pub fn into_typed(self, label: &str) -> Result<T> {
        match self {
            Payload::Typed(v) => Ok(v),
            Payload::Raw(value) => {
                serde_json::from_value(value).map_err(|e| Error::UnexpectedResponse {
                    label: label.to_string(),
                    message: e.to_string(),
                })
            }
            Payload::Empty => Err(ApiFailure::empty_success(label).into_error()),
        }
    }
}

impl<T> Payload<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Payload::Typed(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Payload<U> {
        match self {
            Payload::Typed(v) => Payload::Typed(f(v)),
            Payload::Raw(v) => Payload::Raw(v),
            Payload::Empty => Payload::Empty,
        }
    }
}

impl<T: Serialize> Payload<T> {
    /// JSON view of the payload; `Empty` renders as `true`.
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Typed(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            Payload::Raw(v) => v.clone(),
            Payload::Empty => Value::Bool(true),
        }
    }
}

/// Result of normalizing one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Success(Payload<T>),
    Failure(ApiFailure),
}

impl<T> ApiOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<Payload<T>> {
        match self {
            ApiOutcome::Success(p) => Ok(p),
            ApiOutcome::Failure(f) => Err(f.into_error()),
        }
    }
}

/// Interprets one raw response. See the module docs for the rule order.
pub fn normalize<T: DeserializeOwned>(raw: &RawResponse, label: &str) -> ApiOutcome<T> {
    if raw.is_success() {
        if let Ok(value) = serde_json::from_slice::<T>(&raw.body) {
            return ApiOutcome::Success(Payload::Typed(value));
        }
        if raw.status == 204 || raw.body.iter().all(u8::is_ascii_whitespace) {
            return ApiOutcome::Success(Payload::Empty);
        }
        return match serde_json::from_slice::<Value>(&raw.body) {
            Ok(value) => {
                tracing::debug!(label, "response did not match expected shape, keeping raw JSON");
                ApiOutcome::Success(Payload::Raw(value))
            }
            Err(_) => ApiOutcome::Success(Payload::Raw(Value::String(raw.text()))),
        };
    }

    let status = Some(raw.status);
    let failure = match raw.status {
        401 => ApiFailure::new(FailureKind::Unauthorized, label, status, label.to_string()),
        404 => ApiFailure::new(FailureKind::NotFound, label, status, label.to_string()),
        422 => ApiFailure::new(
            FailureKind::ValidationError,
            label,
            status,
            validation_details(raw, label),
        ),
        code => ApiFailure {
            detail: body_excerpt(raw),
            ..ApiFailure::new(FailureKind::Unknown, label, status, format!("{code} on {label}"))
        },
    };
    ApiOutcome::Failure(failure)
}

/// Sends `request` and normalizes whatever comes back.
///
/// A transport that could not reach the server yields a
/// `TransportUnavailable` failure rather than an `Err`.
pub async fn dispatch<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
    label: &str,
) -> Result<ApiOutcome<T>> {
    match transport.call(request).await {
        Ok(raw) => Ok(normalize(&raw, label)),
        Err(Error::Connection(cause)) => Ok(ApiOutcome::Failure(
            ApiFailure::transport_unavailable(label, cause),
        )),
        Err(other) => Err(other),
    }
}

/// [`dispatch`], with failures raised as errors.
pub(crate) async fn fetch<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
    label: &str,
) -> Result<Payload<T>> {
    dispatch(transport, request, label).await?.into_result()
}

/// `"body.name: field required; body.k: not an integer"`
fn validation_details(raw: &RawResponse, label: &str) -> String {
    let fallback = || {
        let text = raw.text().trim().to_string();
        if text.is_empty() {
            format!("request rejected on {label}")
        } else {
            text
        }
    };

    let Ok(value) = serde_json::from_slice::<Value>(&raw.body) else {
        return fallback();
    };

    match value.get("detail") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| {
                let msg = item
                    .get("msg")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string());
                match item.get("loc").and_then(Value::as_array) {
                    Some(loc) if !loc.is_empty() => {
                        let path: Vec<String> = loc
                            .iter()
                            .map(|p| match p {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect();
                        format!("{}: {}", path.join("."), msg)
                    }
                    _ => msg,
                }
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => fallback(),
    }
}

fn body_excerpt(raw: &RawResponse) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<Value>(&raw.body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return Some(detail.to_string());
        }
    }
    let text = raw.text();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    Some(excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Folder;
    use serde_json::json;

    fn kind<T>(outcome: &ApiOutcome<T>) -> Option<FailureKind> {
        match outcome {
            ApiOutcome::Failure(f) => Some(f.kind),
            ApiOutcome::Success(_) => None,
        }
    }

    #[test]
    fn test_typed_success_is_identity() {
        let raw = RawResponse::json(200, &json!({"id": "f1", "name": "Docs"}));
        match normalize::<Folder>(&raw, "folder get") {
            ApiOutcome::Success(Payload::Typed(folder)) => {
                assert_eq!(folder.id, "f1");
                assert_eq!(folder.name, "Docs");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_no_content_sentinel() {
        for raw in [
            RawResponse::new(204, ""),
            RawResponse::new(200, ""),
            RawResponse::new(201, "  \n"),
        ] {
            let outcome = normalize::<Folder>(&raw, "folder delete");
            assert!(matches!(outcome, ApiOutcome::Success(Payload::Empty)));
        }
    }

    #[test]
    fn test_parser_gap_returns_raw_json() {
        let raw = RawResponse::json(200, &json!({"unexpected": [1, 2]}));
        match normalize::<Folder>(&raw, "folder get") {
            ApiOutcome::Success(Payload::Raw(value)) => {
                assert_eq!(value, json!({"unexpected": [1, 2]}))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_success_returns_text() {
        let raw = RawResponse::new(200, "plain ok");
        match normalize::<Folder>(&raw, "x") {
            ApiOutcome::Success(Payload::Raw(value)) => assert_eq!(value, json!("plain ok")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_status_classes_independent_of_label() {
        for label in ["folder list", "", "knowledge upload"] {
            assert_eq!(
                kind(&normalize::<Value>(&RawResponse::new(401, ""), label)),
                Some(FailureKind::Unauthorized)
            );
            assert_eq!(
                kind(&normalize::<Value>(&RawResponse::new(404, "{}"), label)),
                Some(FailureKind::NotFound)
            );
            assert_eq!(
                kind(&normalize::<Value>(&RawResponse::new(422, "{}"), label)),
                Some(FailureKind::ValidationError)
            );
            assert_eq!(
                kind(&normalize::<Value>(&RawResponse::new(503, ""), label)),
                Some(FailureKind::Unknown)
            );
        }
    }

    #[test]
    fn test_validation_details_joined() {
        let raw = RawResponse::json(
            422,
            &json!({"detail": [
                {"loc": ["body", "name"], "msg": "field required", "type": "missing"},
                {"loc": ["body", "k", 0], "msg": "not an integer"}
            ]}),
        );
        match normalize::<Value>(&raw, "folder create") {
            ApiOutcome::Failure(f) => {
                assert_eq!(f.kind, FailureKind::ValidationError);
                assert_eq!(
                    f.message,
                    "body.name: field required; body.k.0: not an integer"
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_validation_string_detail() {
        let raw = RawResponse::json(422, &json!({"detail": "name taken"}));
        let err = normalize::<Value>(&raw, "folder create")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "name taken"));
    }

    #[test]
    fn test_unknown_status_message() {
        let raw = RawResponse::json(500, &json!({"detail": "database locked"}));
        match normalize::<Value>(&raw, "chat update") {
            ApiOutcome::Failure(f) => {
                assert_eq!(f.message, "500 on chat update");
                assert_eq!(f.detail.as_deref(), Some("database locked"));
                assert_eq!(
                    f.into_error().to_string(),
                    "API error 500 on chat update: database locked"
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(500);
        match normalize::<Value>(&RawResponse::new(502, body), "x") {
            ApiOutcome::Failure(f) => {
                let detail = f.detail.unwrap();
                assert_eq!(detail.len(), EXCERPT_CHARS + 3);
                assert!(detail.ends_with("..."));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_failure_into_error_mapping() {
        let err = normalize::<Value>(&RawResponse::new(401, ""), "folder list")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(ref l) if l == "folder list"));

        let err = normalize::<Value>(&RawResponse::new(404, ""), "chat get")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref l) if l == "chat get"));
    }

    #[test]
    fn test_payload_into_typed() {
        let payload: Payload<Folder> = Payload::Raw(json!({"id": "1", "name": "n"}));
        assert_eq!(payload.into_typed("x").unwrap().id, "1");

        let payload: Payload<Folder> = Payload::Raw(json!({"nope": true}));
        let err = payload.into_typed("folder get").unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }));

        let payload: Payload<Folder> = Payload::Empty;
        assert!(payload.into_typed("folder get").is_err());
    }

    #[test]
    fn test_payload_to_json() {
        assert_eq!(Payload::<Value>::Empty.to_json(), Value::Bool(true));
        assert_eq!(Payload::Typed(json!([1])).to_json(), json!([1]));
    }
}
