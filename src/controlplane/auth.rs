//! Authentication Session Manager
//!
//! Exchanges credentials for a bearer token on the current API generation and
//! holds the resulting session for a single client instance.

use crate::config::{ConfigError, Endpoint};
use crate::controlplane::classify;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Login path on the current API generation
pub const LOGIN_PATH: &str = "v2/auth/login";

// =============================================================================
// Credentials
// =============================================================================

/// Username and password, sourced from a secret by the caller
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Authenticated context for current-generation calls
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    token: String,
    issued_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Holder for at most one live session.
///
/// Readers get a cheap `Arc` clone; writers swap the whole session at once.
/// These three methods are the only way the session changes.
#[derive(Debug, Default)]
pub struct SessionCache {
    current: RwLock<Option<Arc<AuthSession>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live session, if any
    pub fn current(&self) -> Option<Arc<AuthSession>> {
        self.current.read().clone()
    }

    /// Install a new session, dropping whatever was there
    pub fn replace(&self, session: AuthSession) -> Arc<AuthSession> {
        let session = Arc::new(session);
        *self.current.write() = Some(session.clone());
        session
    }

    /// Discard the live session
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    /// Discard the live session only if it is `stale`.
    ///
    /// Returns false when another caller already replaced it.
    pub fn invalidate_if(&self, stale: &Arc<AuthSession>) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(live) if Arc::ptr_eq(live, stale) => {
                *current = None;
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// Authenticator
// =============================================================================

/// Performs the credential exchange. Never touches a [`SessionCache`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    login_url: reqwest::Url,
    timeout: Duration,
}

impl Authenticator {
    /// `timeout` bounds the login request alone and should be shorter than
    /// any deadline of the operation that triggered it.
    pub fn new(
        http: reqwest::Client,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        let login_url = endpoint
            .base_url()?
            .join(LOGIN_PATH)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("invalid login url: {}", e)))?;

        Ok(Self {
            http,
            login_url,
            timeout,
        })
    }

    /// One login round trip
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession> {
        debug!(url = %self.login_url, username = %credentials.username, "authenticating");

        let response = self
            .http
            .post(self.login_url.clone())
            .timeout(self.timeout)
            .json(credentials)
            .send()
            .await
            .map_err(|e| {
                let err = classify::from_transport(&e);
                warn!(error = %err, "authentication request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = classify::error_body(response).await;
            let err = classify::classify_status(
                status.as_u16(),
                classify::status_message(status.as_u16()),
                Some(&body[..]),
            );
            warn!(status = status.as_u16(), kind = %err.kind(), "authentication rejected");
            return Err(err);
        }

        match bearer_token(response.headers()) {
            Some(token) => {
                debug!("authenticated");
                Ok(AuthSession::new(token))
            }
            None => {
                warn!(status = status.as_u16(), "authentication response carried no token");
                Err(Error::NoAuthToken)
            }
        }
    }
}

/// Extract `<token>` from an `Authorization: <scheme> <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let _scheme = parts.next()?;
    let token = parts.next()?;
    Some(token.to_string())
}
