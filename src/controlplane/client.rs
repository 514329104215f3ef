//! Dual-Version API Facade
//!
//! One client, two explicit operation sets:
//!
//! - [`LegacyNodeApi`]: `/v1`, basic credentials on every request, failures
//!   surfaced unclassified as [`Error::Wrapped`].
//! - [`NodeApi`]: `/v2`, bearer token from the cached session, failures
//!   classified by the taxonomy mapper.
//!
//! The client never retries and never drops its session on its own. When a
//! current-generation call returns [`Error::Unauthorized`] the caller decides
//! whether to [`invalidate_session`](ControlPlaneClient::invalidate_session);
//! the next call then logs in again.

use crate::config::{ClientConfig, ConfigError};
use crate::controlplane::auth::{AuthSession, Authenticator, Credentials, SessionCache};
use crate::controlplane::classify;
use crate::domain::node::{LegacyNode, LegacyNodeUpdate, Node, NodeUpdate};
use crate::domain::ports::{LegacyNodeApi, NodeApi};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const LEGACY_NODES: &str = "v1/controllers";
const NODES: &str = "v2/nodes";

// =============================================================================
// Control Plane Client
// =============================================================================

/// Client for both API generations of the storage control plane
#[derive(Debug)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    authenticator: Authenticator,
    session: SessionCache,
    /// Serializes logins so concurrent callers don't each fetch a token
    login: Mutex<()>,
}

impl ControlPlaneClient {
    /// Create a client around an existing HTTP client
    pub fn new(
        http: reqwest::Client,
        config: &ClientConfig,
        credentials: Credentials,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let base_url = config.endpoint.base_url()?;
        let authenticator = Authenticator::new(http.clone(), &config.endpoint, config.auth_timeout())?;

        info!("Created control plane client for {}", config.endpoint);

        Ok(Self {
            http,
            base_url,
            credentials,
            authenticator,
            session: SessionCache::new(),
            login: Mutex::new(()),
        })
    }

    /// Create a client with an HTTP client built from `config`
    pub fn from_config(
        config: &ClientConfig,
        credentials: Credentials,
    ) -> std::result::Result<Self, ConfigError> {
        let http = config.http_client()?;
        Self::new(http, config, credentials)
    }

    // =========================================================================
    // Session Management
    // =========================================================================

    /// The cached session, if one is live
    pub fn session(&self) -> Option<Arc<AuthSession>> {
        self.session.current()
    }

    /// Log in now and install the new session
    pub async fn authenticate(&self) -> Result<Arc<AuthSession>> {
        let _login = self.login.lock().await;
        self.login_locked().await
    }

    /// Drop the cached session; the next current-generation call logs in again
    pub fn invalidate_session(&self) {
        debug!("Invalidating cached session");
        self.session.invalidate();
    }

    /// Drop the cached session only if it is still `stale`
    pub fn invalidate_session_if(&self, stale: &Arc<AuthSession>) -> bool {
        self.session.invalidate_if(stale)
    }

    async fn ensure_session(&self) -> Result<Arc<AuthSession>> {
        if let Some(session) = self.session.current() {
            return Ok(session);
        }

        let _login = self.login.lock().await;
        // Another caller may have logged in while we waited
        if let Some(session) = self.session.current() {
            return Ok(session);
        }
        self.login_locked().await
    }

    async fn login_locked(&self) -> Result<Arc<AuthSession>> {
        let session = self.authenticator.authenticate(&self.credentials).await?;
        info!("Authenticated against {}", self.base_url);
        Ok(self.session.replace(session))
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::wrap(format!("invalid request path {}: {}", path, e)))
    }

    fn legacy_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password)))
    }

    async fn current_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let session = self.ensure_session().await?;
        Ok(self
            .http
            .request(method, self.url(path)?)
            .bearer_auth(session.token()))
    }

    /// Send a legacy request; failures are passed through unclassified
    async fn send_legacy<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| Error::Wrapped {
            message: classify::transport_message(&e),
            detail: None,
            status: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = classify::error_body(response).await;
            let body = String::from_utf8_lossy(&body);
            let body = body.trim();
            debug!(status = status.as_u16(), "legacy request failed");
            return Err(Error::Wrapped {
                message: format!("legacy API: {}", classify::status_message(status.as_u16())),
                detail: (!body.is_empty()).then(|| body.to_string()),
                status: Some(status.as_u16()),
            });
        }

        decode(response).await
    }

    /// Send a current-generation request; failures are classified
    async fn send_current<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| classify::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = classify::error_body(response).await;
            let err = classify::classify_status(
                status.as_u16(),
                classify::status_message(status.as_u16()),
                Some(&body[..]),
            );
            debug!(status = status.as_u16(), kind = %err.kind(), "request failed");
            return Err(err);
        }

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().clone();
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| Error::Wrapped {
        message: format!("failed to decode response from {}", url.path()),
        detail: Some(e.to_string()),
        status: Some(status),
    })
}

// =============================================================================
// Legacy Generation
// =============================================================================

#[async_trait]
impl LegacyNodeApi for ControlPlaneClient {
    async fn legacy_get_node(&self, name: &str) -> Result<LegacyNode> {
        let path = format!("{}/{}", LEGACY_NODES, urlencoding::encode(name));
        let request = self.legacy_request(Method::GET, &path)?;
        self.send_legacy(request).await
    }

    async fn legacy_update_node(&self, update: &LegacyNodeUpdate) -> Result<LegacyNode> {
        debug!(node = %update.name, cordon = update.cordon, drain = update.drain, "Updating legacy node");

        let path = format!("{}/{}", LEGACY_NODES, urlencoding::encode(&update.id));
        let request = self.legacy_request(Method::PUT, &path)?.json(update);
        self.send_legacy(request).await
    }
}

// =============================================================================
// Current Generation
// =============================================================================

#[async_trait]
impl NodeApi for ControlPlaneClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let request = self.current_request(Method::GET, NODES).await?;
        self.send_current(request).await
    }

    /// The API has no lookup by name, so this scans the full listing.
    /// The first match in listing order wins.
    async fn get_node(&self, name: &str) -> Result<Node> {
        self.list_nodes()
            .await?
            .into_iter()
            .find(|node| node.name == name)
            .ok_or_else(|| Error::NotFound(Some(format!("node {} not found", name))))
    }

    async fn get_node_by_id(&self, id: &str) -> Result<Node> {
        let path = format!("{}/{}", NODES, urlencoding::encode(id));
        let request = self.current_request(Method::GET, &path).await?;
        self.send_current(request).await
    }

    /// A stale `version` comes back as `StaleWrite` or `Conflict`; it is
    /// never retried here, the caller must re-read first.
    async fn update_node(&self, update: &NodeUpdate) -> Result<Node> {
        debug!(node = %update.id, version = %update.version, "Updating node");

        let path = format!("{}/{}", NODES, urlencoding::encode(&update.id));
        let request = self.current_request(Method::PUT, &path).await?.json(update);
        self.send_current(request).await
    }
}
