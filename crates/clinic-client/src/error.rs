//! Failure taxonomy and normalization
//!
//! Every raw failure in the pipeline is converted into exactly one
//! `NormalizedError` before it reaches calling code. `normalize` is total:
//! any input produces a result, nothing is swallowed, and already-normalized
//! errors pass through unchanged.

use std::collections::HashMap;

/// What went wrong, at the coarsest level callers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request was sent but no response came back
    Network,
    /// Request could not be constructed or handed to the transport
    RequestSetup,
    /// Server responded with this non-success status
    HttpStatus(u16),
    /// Anything not classifiable
    Unknown,
}

/// Uniform error contract surfaced by every operation in this crate.
///
/// Immutable once constructed. `retryable` is the default consulted by the
/// retry coordinator when no per-call predicate is supplied. `cause`
/// preserves the original failure's description for logs and debugging;
/// `message` is the user-facing text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct NormalizedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    /// Per-field validation messages from the response body's `errors` map
    pub validation_fields: Option<HashMap<String, Vec<String>>>,
    pub cause: Option<String>,
}

impl NormalizedError {
    /// An unclassifiable, non-retryable failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: message.into(),
            retryable: false,
            validation_fields: None,
            cause: None,
        }
    }
}

/// A raw failure as produced by the transport layer, before normalization.
#[derive(Debug)]
pub enum RawFailure {
    /// Server responded with a non-success status. `body` is the parsed
    /// response envelope when the body was valid JSON.
    Status {
        code: u16,
        body: Option<serde_json::Value>,
        detail: String,
    },
    /// Request went out but no response was received
    Network(String),
    /// Transport failed before the request was sent
    Setup(String),
    /// Already normalized — passes through unchanged
    Normalized(NormalizedError),
    /// Anything else
    Other(String),
}

/// User-facing message for failures where the server was never reached.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Whether a response status is worth retrying blindly.
///
/// 401 is deliberately excluded: expired credentials are resolved by the
/// refresh coordinator, never by re-sending the same request.
pub fn is_retryable_status(code: u16) -> bool {
    matches!(code, 408 | 429) || (500..=599).contains(&code)
}

/// Generic per-status message shown when the response body carries none.
fn status_message(code: u16) -> String {
    match code {
        400 => "Invalid request.".into(),
        401 => "Authentication required.".into(),
        403 => "You do not have permission to perform this action.".into(),
        404 => "The requested resource was not found.".into(),
        408 => "The request timed out. Please try again.".into(),
        409 => "This change conflicts with the current state. Please reload and retry.".into(),
        422 => "Validation failed. Please review the highlighted fields.".into(),
        429 => "Too many requests. Please wait a moment and try again.".into(),
        500..=599 => "Server error. Please try again later.".into(),
        _ => format!("Request failed with status {code}."),
    }
}

/// Extract the `errors` field → per-field message lists, tolerating both
/// `["msg", ...]` arrays and bare `"msg"` strings per field.
fn validation_fields(body: &serde_json::Value) -> Option<HashMap<String, Vec<String>>> {
    let errors = body.get("errors")?.as_object()?;
    let mut fields = HashMap::new();
    for (field, value) in errors {
        let messages: Vec<String> = match value {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            serde_json::Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        };
        if !messages.is_empty() {
            fields.insert(field.clone(), messages);
        }
    }
    if fields.is_empty() { None } else { Some(fields) }
}

/// Map a raw failure into the taxonomy. Total and side-effect-free.
///
/// Classification order:
/// 1. Response with a status code → `HttpStatus(code)`; message from the
///    body's `message` field, else a generic per-status message
/// 2. Sent but no response → `Network`, retryable
/// 3. Failed before sending → `RequestSetup`, retryable
/// 4. Already normalized → returned unchanged
/// 5. Anything else → `Unknown`, not retryable
pub fn normalize(raw: RawFailure) -> NormalizedError {
    match raw {
        RawFailure::Status { code, body, detail } => {
            let body_message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned);
            NormalizedError {
                kind: ErrorKind::HttpStatus(code),
                message: body_message.unwrap_or_else(|| status_message(code)),
                retryable: is_retryable_status(code),
                validation_fields: body.as_ref().and_then(validation_fields),
                cause: Some(detail),
            }
        }
        RawFailure::Network(detail) => NormalizedError {
            kind: ErrorKind::Network,
            message: NETWORK_ERROR_MESSAGE.into(),
            retryable: true,
            validation_fields: None,
            cause: Some(detail),
        },
        RawFailure::Setup(detail) => NormalizedError {
            kind: ErrorKind::RequestSetup,
            message: "The request could not be sent.".into(),
            retryable: true,
            validation_fields: None,
            cause: Some(detail),
        },
        RawFailure::Normalized(error) => error,
        RawFailure::Other(detail) => NormalizedError {
            kind: ErrorKind::Unknown,
            message: "An unexpected error occurred.".into(),
            retryable: false,
            validation_fields: None,
            cause: Some(detail),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_with_body_message_uses_it() {
        let error = normalize(RawFailure::Status {
            code: 422,
            body: Some(json!({"status": "error", "message": "Date of birth is required"})),
            detail: "HTTP 422 for /patients".into(),
        });
        assert_eq!(error.kind, ErrorKind::HttpStatus(422));
        assert_eq!(error.message, "Date of birth is required");
        assert!(!error.retryable);
        assert_eq!(error.cause.as_deref(), Some("HTTP 422 for /patients"));
    }

    #[test]
    fn status_without_body_message_falls_back_to_generic() {
        let error = normalize(RawFailure::Status {
            code: 404,
            body: Some(json!({"status": "error"})),
            detail: "HTTP 404".into(),
        });
        assert_eq!(error.message, "The requested resource was not found.");
    }

    #[test]
    fn status_collects_validation_fields() {
        let error = normalize(RawFailure::Status {
            code: 422,
            body: Some(json!({
                "status": "error",
                "message": "Validation failed",
                "errors": {
                    "email": ["must be a valid email"],
                    "phone": "must be numeric"
                }
            })),
            detail: "HTTP 422".into(),
        });
        let fields = error.validation_fields.unwrap();
        assert_eq!(fields["email"], vec!["must be a valid email"]);
        assert_eq!(fields["phone"], vec!["must be numeric"]);
    }

    #[test]
    fn retryable_statuses_are_429_408_and_5xx() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(408));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(422));
    }

    #[test]
    fn network_failure_is_retryable_with_fixed_message() {
        let error = normalize(RawFailure::Network("connection reset by peer".into()));
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.message, NETWORK_ERROR_MESSAGE);
        assert!(error.retryable);
        assert_eq!(error.cause.as_deref(), Some("connection reset by peer"));
    }

    #[test]
    fn setup_failure_is_retryable() {
        let error = normalize(RawFailure::Setup("invalid header value".into()));
        assert_eq!(error.kind, ErrorKind::RequestSetup);
        assert!(error.retryable);
    }

    #[test]
    fn already_normalized_passes_through_unchanged() {
        let original = NormalizedError {
            kind: ErrorKind::HttpStatus(503),
            message: "Server error. Please try again later.".into(),
            retryable: true,
            validation_fields: None,
            cause: Some("HTTP 503".into()),
        };
        let error = normalize(RawFailure::Normalized(original.clone()));
        assert_eq!(error.kind, original.kind);
        assert_eq!(error.message, original.message);
        assert_eq!(error.retryable, original.retryable);
        assert_eq!(error.cause, original.cause);

        // Normalizing twice changes nothing
        let again = normalize(RawFailure::Normalized(error));
        assert_eq!(again.kind, original.kind);
        assert_eq!(again.message, original.message);
    }

    #[test]
    fn unclassifiable_input_maps_to_unknown() {
        let error = normalize(RawFailure::Other("panicked string payload".into()));
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(!error.retryable);
        assert_eq!(error.cause.as_deref(), Some("panicked string payload"));
    }

    #[test]
    fn malformed_errors_field_is_ignored() {
        let error = normalize(RawFailure::Status {
            code: 422,
            body: Some(json!({"status": "error", "errors": {"email": 42}})),
            detail: "HTTP 422".into(),
        });
        assert!(error.validation_fields.is_none());
    }

    #[test]
    fn status_without_body_uses_generic_message() {
        let error = normalize(RawFailure::Status {
            code: 502,
            body: None,
            detail: "HTTP 502".into(),
        });
        assert_eq!(error.message, "Server error. Please try again later.");
        assert!(error.retryable);
    }
}
