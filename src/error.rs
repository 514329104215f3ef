//! Error types for the Control Plane Client
//!
//! Every failure surfaced by the client is one of a fixed set of kinds.
//! Upstream reconciliation logic branches on these kinds, so new variants
//! are not added lightly.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classified error returned by every client operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("bad request{}", suffix(.0))]
    BadRequest(Option<String>),

    #[error("unauthorized{}", suffix(.0))]
    Unauthorized(Option<String>),

    #[error("not found{}", suffix(.0))]
    NotFound(Option<String>),

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    #[error("conflict{}", suffix(.0))]
    Conflict(Option<String>),

    #[error("stale write{}", suffix(.0))]
    StaleWrite(Option<String>),

    #[error("invalid state transition{}", suffix(.0))]
    InvalidStateTransition(Option<String>),

    #[error("resource locked{}", suffix(.0))]
    Locked(Option<String>),

    // =========================================================================
    // Server Errors
    // =========================================================================
    #[error("licence does not permit operation{}", suffix(.0))]
    LicenceCapability(Option<String>),

    #[error("server error{}", suffix(.0))]
    ServerError(Option<String>),

    #[error("store unavailable{}", suffix(.0))]
    StoreUnavailable(Option<String>),

    // =========================================================================
    // Client-side Errors
    // =========================================================================
    #[error("no auth token in authentication response")]
    NoAuthToken,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// Anything outside the taxonomy. `status` is the HTTP status when a
    /// response was received, `None` when the request never got one.
    #[error("{message}{}", suffix(.detail))]
    Wrapped {
        message: String,
        detail: Option<String>,
        status: Option<u16>,
    },
}

fn suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

/// Discriminant of [`Error`], for branching and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    StaleWrite,
    InvalidStateTransition,
    Locked,
    LicenceCapability,
    ServerError,
    StoreUnavailable,
    NoAuthToken,
    TimedOut,
    Wrapped,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StaleWrite => "stale_write",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::Locked => "locked",
            ErrorKind::LicenceCapability => "licence_capability",
            ErrorKind::ServerError => "server_error",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::NoAuthToken => "no_auth_token",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::Wrapped => "wrapped",
        };
        f.write_str(name)
    }
}

/// What the caller should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Retry the same request, possibly after a delay
    Retry,
    /// Discard the cached session and log in again before retrying
    Reauthenticate,
    /// Re-read the resource before attempting the write again
    Refetch,
    /// Don't retry, the request itself is wrong
    Abort,
}

impl Error {
    /// Wrap an arbitrary message into the fallback kind
    pub fn wrap(message: impl Into<String>) -> Self {
        Error::Wrapped {
            message: message.into(),
            detail: None,
            status: None,
        }
    }

    /// HTTP status behind a wrapped error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Wrapped { status, .. } => *status,
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::StaleWrite(_) => ErrorKind::StaleWrite,
            Error::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            Error::Locked(_) => ErrorKind::Locked,
            Error::LicenceCapability(_) => ErrorKind::LicenceCapability,
            Error::ServerError(_) => ErrorKind::ServerError,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Error::NoAuthToken => ErrorKind::NoAuthToken,
            Error::TimedOut(_) => ErrorKind::TimedOut,
            Error::Wrapped { .. } => ErrorKind::Wrapped,
        }
    }

    /// Human-readable detail extracted from the response body, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::BadRequest(d)
            | Error::Unauthorized(d)
            | Error::NotFound(d)
            | Error::Conflict(d)
            | Error::StaleWrite(d)
            | Error::InvalidStateTransition(d)
            | Error::Locked(d)
            | Error::LicenceCapability(d)
            | Error::ServerError(d)
            | Error::StoreUnavailable(d) => d.as_deref(),
            Error::Wrapped { detail, .. } => detail.as_deref(),
            Error::NoAuthToken | Error::TimedOut(_) => None,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Session expired or was revoked
            Error::Unauthorized(_) => ErrorAction::Reauthenticate,

            // Someone else wrote first
            Error::Conflict(_) | Error::StaleWrite(_) => ErrorAction::Refetch,

            // Transient conditions
            Error::Locked(_)
            | Error::ServerError(_)
            | Error::StoreUnavailable(_)
            | Error::TimedOut(_) => ErrorAction::Retry,

            // No response at all, or a status the server may answer differently later
            Error::Wrapped { status, .. } => match *status {
                None | Some(408) | Some(429) => ErrorAction::Retry,
                Some(code) if code >= 500 => ErrorAction::Retry,
                Some(_) => ErrorAction::Abort,
            },

            Error::BadRequest(_)
            | Error::NotFound(_)
            | Error::InvalidStateTransition(_)
            | Error::LicenceCapability(_)
            | Error::NoAuthToken => ErrorAction::Abort,
        }
    }

    /// Check if repeating the identical request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self.action(), ErrorAction::Retry)
    }

    /// Check if the cached session must be discarded
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self.action(), ErrorAction::Reauthenticate)
    }
}

/// Result type alias for the client
pub type Result<T> = std::result::Result<T, Error>;
