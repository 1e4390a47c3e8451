//! HTTP and WebSocket handlers for the Tandem server.
//!
//! The upgrade handler authenticates the caller and authorizes the target
//! room before any client exists; rejected requests never reach the hub.

use crate::auth::StaticAuth;
use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard, MeteredStore};
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    validate_room_id, Hub, HubError, HubHandle, MemoryStore, MessageStore, RoomAccess, StoreError,
};
use tandem_protocol::{codec, ChatMessage, ProtocolError, ReadReceipt, ServerFrame};
use tandem_transport::{websocket, Client, Services};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Default number of messages returned by a history request.
const DEFAULT_HISTORY: usize = 50;

/// Shared server state.
pub struct AppState {
    /// The connection hub.
    pub hub: HubHandle,
    /// Chat history.
    pub store: Arc<dyn MessageStore>,
    /// Tokens and room membership.
    pub auth: Arc<StaticAuth>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state and start the hub.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Hub::spawn(config.hub_config()),
            store: Arc::new(MeteredStore::new(MemoryStore::new())),
            auth: Arc::new(StaticAuth::from_config(&config.auth)),
            config,
        }
    }

    fn services(&self) -> Services {
        Services {
            hub: self.hub.clone(),
            store: Arc::clone(&self.store),
            access: Arc::clone(&self.auth) as Arc<dyn RoomAccess>,
        }
    }
}

/// API errors, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid token")]
    Unauthorized,

    #[error("Not a participant of this room")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Build the HTTP router.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/rooms/:room_id/members", get(members_handler))
        .route("/rooms/:room_id/messages", get(history_handler))
        .route("/rooms/:room_id/read", post(read_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let state = Arc::new(AppState::new(config.clone()));

    if config.metrics.enabled {
        metrics::spawn_hub_reporter(
            state.hub.clone(),
            Duration::from_millis(config.metrics.report_interval_ms.max(1)),
        );
    }

    let app = build_app(Arc::clone(&state));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Tandem server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Tandem server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
    room_id: Option<String>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (identity, room) = match authorize_upgrade(&state, params).await {
        Ok(target) => target,
        Err(e) => {
            metrics::record_rejection(e.status().as_u16());
            debug!(error = %e, "Upgrade rejected");
            return Err(e);
        }
    };

    Ok(ws
        .max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, identity, room, state)))
}

async fn authorize_upgrade(
    state: &AppState,
    params: ConnectParams,
) -> Result<(String, String), ApiError> {
    let identity = params
        .token
        .as_deref()
        .and_then(|token| state.auth.authenticate(token))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let room = params
        .room_id
        .ok_or_else(|| ApiError::BadRequest("room_id is required".to_string()))?;
    authorize_room(state, &identity, &room).await?;

    Ok((identity, room))
}

/// Handle an authorized WebSocket connection.
async fn handle_websocket(socket: WebSocket, identity: String, room: String, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    debug!(identity = %identity, room = %room, "WebSocket connected");

    let (source, sink) = websocket::split(socket);
    let reason = Client::new(
        identity,
        source,
        sink,
        state.services(),
        state.config.client_config(),
    )
    .join_on_start(room)
    .run()
    .await;

    metrics::record_disconnect_reason(&reason);
}

fn bearer_identity(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.auth.authenticate(token.trim()))
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}

async fn authorize_room(state: &AppState, identity: &str, room: &str) -> Result<(), ApiError> {
    validate_room_id(room).map_err(|reason| ApiError::BadRequest(reason.to_string()))?;
    if !state.auth.can_access(identity, room).await {
        warn!(identity = %identity, room = %room, "Room access denied");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct MembersResponse {
    room_id: String,
    members: Vec<String>,
}

async fn members_handler(
    Path(room_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MembersResponse>, ApiError> {
    let identity = bearer_identity(&state, &headers)?;
    authorize_room(&state, &identity, &room_id).await?;

    let mut members: Vec<String> = state
        .hub
        .members_of(room_id.as_str())
        .await?
        .into_iter()
        .collect();
    members.sort();

    Ok(Json(MembersResponse { room_id, members }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn history_handler(
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let identity = bearer_identity(&state, &headers)?;
    authorize_room(&state, &identity, &room_id).await?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY)
        .min(state.config.limits.history_limit);
    let messages = state.store.recent_messages(&room_id, limit).await?;

    Ok(Json(messages))
}

async fn read_handler(
    Path(room_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let identity = bearer_identity(&state, &headers)?;
    authorize_room(&state, &identity, &room_id).await?;

    let receipt = ReadReceipt {
        room_id: room_id.clone(),
        reader_id: identity.clone(),
        read_at: Utc::now(),
    };
    let payload = codec::encode(&ServerFrame::MessagesRead(receipt))?;
    state
        .hub
        .broadcast(room_id, payload, Some(identity.as_str()))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use futures_util::{SinkExt, StreamExt};
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use tandem_protocol::ClientFrame;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::{self, Message};
    use tower::ServiceExt;

    fn test_config() -> Config {
        toml::from_str(
            r#"
            [auth]
            users = [
                { id = "alice", token = "t-alice" },
                { id = "bob", token = "t-bob" },
                { id = "mallory", token = "t-mallory" },
            ]
            rooms = [{ id = "private", members = ["alice", "bob"] }]
            "#,
        )
        .unwrap()
    }

    async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
        let state = Arc::new(AppState::new(test_config()));
        let app = build_app(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn wait_for_members(hub: &HubHandle, room: &str, expected: &[&str]) {
        let expected: HashSet<String> = expected.iter().map(|s| s.to_string()).collect();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if hub.members_of(room).await.unwrap() == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("room membership never matched");
    }

    type TestSocket =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

    async fn connect(addr: SocketAddr, token: &str, room: &str) -> TestSocket {
        let url = format!("ws://{}/ws?token={}&room_id={}", addr, token, room);
        let (socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        socket
    }

    async fn rejection_status(addr: SocketAddr, query: &str) -> u16 {
        match tokio_tungstenite::connect_async(format!("ws://{}/ws?{}", addr, query)).await {
            Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Upgrade should have been rejected"),
        }
    }

    #[tokio::test]
    async fn test_upgrade_rejections() {
        let (addr, state) = spawn_server().await;

        assert_eq!(rejection_status(addr, "token=nope&room_id=match-42").await, 401);
        assert_eq!(rejection_status(addr, "room_id=match-42").await, 401);
        assert_eq!(rejection_status(addr, "token=t-alice").await, 400);
        assert_eq!(rejection_status(addr, "token=t-alice&room_id=$system").await, 400);
        assert_eq!(rejection_status(addr, "token=t-mallory&room_id=private").await, 403);

        assert_eq!(state.hub.stats().await.unwrap().clients, 0);
    }

    #[tokio::test]
    async fn test_two_clients_chat() {
        let (addr, state) = spawn_server().await;

        let mut alice = connect(addr, "t-alice", "match-42").await;
        let mut bob = connect(addr, "t-bob", "match-42").await;
        wait_for_members(&state.hub, "match-42", &["alice", "bob"]).await;

        let frame = serde_json::to_string(&ClientFrame::message("match-42", "hello")).unwrap();
        alice.send(Message::Text(frame)).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match bob.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("Connection ended: {:?}", other),
                }
            }
        })
        .await
        .unwrap();

        match codec::decode::<ServerFrame>(received.as_bytes()).unwrap() {
            ServerFrame::ChatMessage(message) => {
                assert_eq!(message.sender_id, "alice");
                assert_eq!(message.content, "hello");
                assert_eq!(message.room_id, "match-42");
            }
            other => panic!("Unexpected frame: {:?}", other),
        }

        alice.close(None).await.unwrap();
        wait_for_members(&state.hub, "match-42", &["bob"]).await;
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let state = Arc::new(AppState::new(test_config()));
        for i in 0..3 {
            state
                .store
                .save_message("private", "alice", &format!("m{}", i))
                .await
                .unwrap();
        }

        let response = build_app(Arc::clone(&state))
            .oneshot(request("GET", "/rooms/private/messages?limit=2", Some("t-bob")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let messages: Vec<ChatMessage> = serde_json::from_slice(&body).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2"]);

        let response = build_app(Arc::clone(&state))
            .oneshot(request("GET", "/rooms/private/messages", Some("t-mallory")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = build_app(state)
            .oneshot(request("GET", "/rooms/private/messages", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], "Missing or invalid token");
    }

    #[tokio::test]
    async fn test_members_and_read_receipt() {
        let (addr, state) = spawn_server().await;

        let mut alice = connect(addr, "t-alice", "lobby").await;
        let _bob = connect(addr, "t-bob", "lobby").await;
        wait_for_members(&state.hub, "lobby", &["alice", "bob"]).await;

        let response = build_app(Arc::clone(&state))
            .oneshot(request("GET", "/rooms/lobby/members", Some("t-alice")))
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let members: MembersResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(members.room_id, "lobby");
        assert_eq!(members.members, vec!["alice", "bob"]);

        let response = build_app(Arc::clone(&state))
            .oneshot(request("POST", "/rooms/lobby/read", Some("t-bob")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match alice.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("Connection ended: {:?}", other),
                }
            }
        })
        .await
        .unwrap();

        match codec::decode::<ServerFrame>(received.as_bytes()).unwrap() {
            ServerFrame::MessagesRead(receipt) => {
                assert_eq!(receipt.room_id, "lobby");
                assert_eq!(receipt.reader_id, "bob");
            }
            other => panic!("Unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let state = Arc::new(AppState::new(test_config()));
        let response = build_app(state)
            .oneshot(request("GET", "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
