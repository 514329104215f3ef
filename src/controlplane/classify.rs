//! Error Taxonomy Mapper
//!
//! Translates a transport error and/or an HTTP status into one of the fixed
//! [`Error`] kinds. Pure functions: no I/O, no logging, no retries.

use crate::error::Error;
use serde::Deserialize;
use std::error::Error as StdError;

/// Error body returned by the current API generation
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a failed or failing call.
///
/// Returns `None` only when there is no transport error and the status is
/// absent or not an error status.
pub fn classify(
    transport: Option<&(dyn StdError + 'static)>,
    status: Option<u16>,
    body: Option<&[u8]>,
) -> Option<Error> {
    match (transport, status) {
        (_, Some(code)) if code >= 400 => {
            let message = match transport {
                Some(err) => transport_message(err),
                None => status_message(code),
            };
            Some(classify_status(code, message, body))
        }
        (Some(err), _) => Some(Error::Wrapped {
            message: transport_message(err),
            detail: body.and_then(extract_detail),
            status,
        }),
        (None, _) => None,
    }
}

/// Map an error status onto its kind.
///
/// `message` is only kept by the fallback arm.
pub fn classify_status(status: u16, message: String, body: Option<&[u8]>) -> Error {
    let detail = body.and_then(extract_detail);

    match status {
        400 => Error::BadRequest(detail),
        401 => Error::Unauthorized(detail),
        404 => Error::NotFound(detail),
        409 => Error::Conflict(detail),
        412 => Error::StaleWrite(detail),
        422 => Error::InvalidStateTransition(detail),
        423 => Error::Locked(detail),
        451 => Error::LicenceCapability(detail),
        500 => Error::ServerError(detail),
        503 => Error::StoreUnavailable(detail),
        _ => Error::Wrapped {
            message,
            detail,
            status: Some(status),
        },
    }
}

/// Classify a `reqwest` transport failure that produced no response
pub fn from_transport(err: &reqwest::Error) -> Error {
    let status = err.status().map(|s| s.as_u16());
    let source: &(dyn StdError + 'static) = err;
    classify(Some(source), status, None).unwrap_or_else(|| Error::wrap(transport_message(err)))
}

/// Pull a human-readable detail out of an error body
pub fn extract_detail(body: &[u8]) -> Option<String> {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let detail = parsed.error.or(parsed.message).filter(|d| !d.trim().is_empty());
        if detail.is_some() {
            return detail;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('{') {
        None
    } else {
        Some(text.to_string())
    }
}

/// Read the body of an error response.
///
/// A failed read becomes the body text, so it still shows up as the detail.
pub(crate) async fn error_body(response: reqwest::Response) -> Vec<u8> {
    match response.bytes().await {
        Ok(body) => body.to_vec(),
        Err(e) => format!("failed to read response body: {}", transport_message(&e)).into_bytes(),
    }
}

/// Status line used when there is no transport error to describe the failure
pub fn status_message(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

/// Render an error with its source chain, e.g. "error sending request: connection refused"
pub(crate) fn transport_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
