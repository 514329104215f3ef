//! In-process fake control plane for tests
//!
//! Serves both API generations on an ephemeral port with just enough
//! behaviour to exercise the client: basic auth on `/v1`, token login and
//! bearer checks on `/v2`, version-guarded node updates.

use crate::config::Endpoint;
use crate::controlplane::auth::Credentials;
use crate::domain::node::{LegacyNode, LegacyNodeUpdate, Node, NodeUpdate};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const USERNAME: &str = "admin";
const PASSWORD: &str = "secret";
/// base64("admin:secret")
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

/// Route test logs through the test harness. `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct FakeState {
    tokens: Vec<String>,
    logins: u32,
    omit_login_token: bool,
    login_delay: Duration,
    nodes: Vec<Node>,
    legacy_nodes: Vec<LegacyNode>,
    list_failures: VecDeque<u16>,
}

type Shared = Arc<Mutex<FakeState>>;

/// Handle to a running fake server
#[derive(Clone)]
pub struct FakeControlPlane {
    addr: SocketAddr,
    state: Shared,
}

impl FakeControlPlane {
    pub async fn start() -> Self {
        init_tracing();

        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/v2/auth/login", post(login))
            .route("/v2/nodes", get(list_nodes))
            .route("/v2/nodes/:id", get(get_node).put(update_node))
            .route("/v1/controllers/:key", get(legacy_get).put(legacy_update))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("http", self.addr.ip().to_string(), self.addr.port())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(USERNAME, PASSWORD)
    }

    /// Most recently issued token
    pub fn issued_token(&self) -> Option<String> {
        self.state.lock().tokens.last().cloned()
    }

    pub fn login_count(&self) -> u32 {
        self.state.lock().logins
    }

    pub fn omit_login_token(&self) {
        self.state.lock().omit_login_token = true;
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.state.lock().login_delay = delay;
    }

    /// Expire every issued token
    pub fn revoke_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Answer the next node listings with these statuses
    pub fn fail_next_lists(&self, statuses: &[u16]) {
        self.state.lock().list_failures.extend(statuses.iter().copied());
    }

    pub fn add_node(&self, name: &str) -> Node {
        let mut state = self.state.lock();
        let node = Node {
            id: format!("node-{}", state.nodes.len() + 1),
            name: name.to_string(),
            labels: BTreeMap::new(),
            version: "1".to_string(),
        };
        state.nodes.push(node.clone());
        node
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.state.lock().nodes.iter().find(|n| n.id == id).cloned()
    }

    pub fn add_legacy_node(&self, name: &str) -> LegacyNode {
        let mut state = self.state.lock();
        let node = LegacyNode {
            id: format!("ctrl-{}", state.legacy_nodes.len() + 1),
            name: name.to_string(),
            description: format!("{} controller", name),
            labels: BTreeMap::new(),
            cordon: false,
            drain: false,
        };
        state.legacy_nodes.push(node.clone());
        node
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn authorize(state: &FakeState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) if state.tokens.iter().any(|issued| issued == t) => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "unauthenticated")),
    }
}

fn authorize_basic(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(BASIC_AUTH) => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(request): Json<LoginRequest>) -> Response {
    let delay = state.lock().login_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock();
    if request.username != USERNAME || request.password != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "invalid credentials");
    }

    state.logins += 1;
    let token = format!("token-{}", state.logins);
    state.tokens.push(token.clone());

    let body = Json(json!({ "username": request.username }));
    if state.omit_login_token {
        (StatusCode::OK, body).into_response()
    } else {
        (
            StatusCode::OK,
            [(header::AUTHORIZATION, format!("Bearer {}", token))],
            body,
        )
            .into_response()
    }
}

async fn list_nodes(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock();
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    if let Some(status) = state.list_failures.pop_front() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error(status, "injected failure");
    }
    Json(state.nodes.clone()).into_response()
}

async fn get_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let state = state.lock();
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    match state.nodes.iter().find(|n| n.id == id) {
        Some(node) => Json(node.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "node not found"),
    }
}

async fn update_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<NodeUpdate>,
) -> Response {
    let mut state = state.lock();
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let Some(node) = state.nodes.iter_mut().find(|n| n.id == id) else {
        return error(StatusCode::NOT_FOUND, "node not found");
    };
    if node.version != update.version {
        return error(StatusCode::PRECONDITION_FAILED, "stale write: version mismatch");
    }

    node.labels = update.labels;
    let next: u64 = node.version.parse().unwrap_or(0) + 1;
    node.version = next.to_string();
    Json(node.clone()).into_response()
}

async fn legacy_get(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = authorize_basic(&headers) {
        return response;
    }
    let state = state.lock();
    match state.legacy_nodes.iter().find(|n| n.name == name) {
        Some(node) => Json(node.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "controller not found").into_response(),
    }
}

async fn legacy_update(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<LegacyNodeUpdate>,
) -> Response {
    if let Err(response) = authorize_basic(&headers) {
        return response;
    }
    let mut state = state.lock();
    let Some(node) = state.legacy_nodes.iter_mut().find(|n| n.id == id) else {
        return (StatusCode::NOT_FOUND, "controller not found").into_response();
    };

    node.name = update.name;
    node.description = update.description;
    node.labels = update.labels;
    node.cordon = update.cordon;
    node.drain = update.drain;
    Json(node.clone()).into_response()
}

/// Server that answers every request with `status` and a body cut short:
/// it promises more bytes than it sends, then closes the connection.
pub async fn truncated_body_server(status: u16) -> Endpoint {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if !read_request(&mut socket).await {
                    return;
                }
                let head = format!(
                    "HTTP/1.1 {} Injected\r\nContent-Length: 64\r\nConnection: close\r\n\r\npartial",
                    status
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Endpoint::new("http", addr.ip().to_string(), addr.port())
}

/// Consume one request, headers and body, so closing doesn't reset the peer
async fn read_request(socket: &mut tokio::net::TcpStream) -> bool {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return false,
            Ok(n) => n,
        };
        request.extend_from_slice(&buf[..n]);

        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + length {
            return true;
        }
    }
}
