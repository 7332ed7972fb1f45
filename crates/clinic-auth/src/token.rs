//! Refresh endpoint wire contract
//!
//! The refresh call is `POST /auth/refresh` with no request body — the
//! refresh secret travels in an HTTP-only cookie managed by the server.
//! The response uses the standard API envelope:
//!
//! ```json
//! { "status": "success", "data": { "accessToken": "..." } }
//! { "status": "error", "message": "refresh token expired" }
//! ```
//!
//! A `"success"` status without `data.accessToken` is still a refresh
//! failure: the caller must not keep serving requests with the old token.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Path of the refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Envelope shape of the refresh response.
#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    status: String,
    #[serde(default)]
    data: Option<RefreshData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

/// Extract the new access token from a refresh response body.
///
/// Returns `RefreshRejected` when the server reports an error status or
/// omits the token, and `MalformedResponse` when the body does not parse
/// as the expected envelope at all.
pub fn parse_refresh_response(body: &serde_json::Value) -> Result<String> {
    let envelope: RefreshEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;

    if envelope.status != "success" {
        let message = envelope
            .message
            .unwrap_or_else(|| format!("server reported status {:?}", envelope.status));
        return Err(Error::RefreshRejected(message));
    }

    envelope
        .data
        .and_then(|d| d.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::RefreshRejected("success response without accessToken".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_with_token_parses() {
        let body = json!({"status": "success", "data": {"accessToken": "abc123"}});
        assert_eq!(parse_refresh_response(&body).unwrap(), "abc123");
    }

    #[test]
    fn error_status_uses_server_message() {
        let body = json!({"status": "error", "message": "refresh token expired"});
        let err = parse_refresh_response(&body).unwrap_err();
        assert!(matches!(err, Error::RefreshRejected(ref m) if m == "refresh token expired"));
    }

    #[test]
    fn error_status_without_message_still_rejects() {
        let body = json!({"status": "error"});
        assert!(matches!(
            parse_refresh_response(&body),
            Err(Error::RefreshRejected(_))
        ));
    }

    #[test]
    fn success_without_data_is_rejected() {
        let body = json!({"status": "success"});
        let err = parse_refresh_response(&body).unwrap_err();
        assert!(matches!(err, Error::RefreshRejected(ref m) if m.contains("accessToken")));
    }

    #[test]
    fn success_with_empty_token_is_rejected() {
        let body = json!({"status": "success", "data": {"accessToken": ""}});
        assert!(matches!(
            parse_refresh_response(&body),
            Err(Error::RefreshRejected(_))
        ));
    }

    #[test]
    fn non_envelope_body_is_malformed() {
        let body = json!(["not", "an", "envelope"]);
        assert!(matches!(
            parse_refresh_response(&body),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn extra_envelope_fields_are_ignored() {
        let body = json!({
            "status": "success",
            "data": {"accessToken": "abc", "expiresIn": 900},
            "requestId": "req_1"
        });
        assert_eq!(parse_refresh_response(&body).unwrap(), "abc");
    }
}
