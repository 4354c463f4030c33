//! HTTP/WebSocket API for UI clients
//!
//! Exposes the state snapshot/query surface and the layout mutators over
//! REST, plus the WebSocket endpoint clients subscribe to. Every new
//! WebSocket connection receives a full state snapshot before any
//! incremental update. Default port: 8280.

use crate::broadcast::{ClientRegistry, ClientSink, ServerMessage};
use crate::layout::{BusTarget, GlobalGroup, GroupSettings, LayoutSection, LayoutStore, ViewSettings};
use crate::link::MixerLink;
use crate::state::{AppState, AuxBusState, BusType, ChannelPatch, ChannelState, MixerStore};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Default API port
pub const DEFAULT_API_PORT: u16 = 8280;

/// Shared state for API handlers
pub struct ApiState {
    /// Authoritative mixer state
    pub store: MixerStore,
    /// Persisted layout configuration
    pub layout: LayoutStore,
    /// Live client connections
    pub clients: ClientRegistry,
    /// Outbound command surface of the hardware protocol client, when one is
    /// attached; without it channel updates stay local to the mirror
    pub link: Option<Arc<dyn MixerLink>>,
}

/// API error response
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: msg.into() }
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, error: msg.into() }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: format!("{err:#}") }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.error });
        (self.status, Json(body)).into_response()
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/state/:bus_type/:bus", get(get_state))
        .route(
            "/api/channel/:bus_type/:bus/:id",
            axum::routing::put(put_channel),
        )
        .route("/api/aux/:id", axum::routing::put(put_aux_name))
        .route("/api/layout/aux/:bus", get(get_aux_layout).put(put_aux_layout))
        .route("/api/groups", get(get_groups).put(put_groups))
        .route("/api/settings/:bus_type", get(get_settings).put(put_settings))
        .route("/api/view/:bus_type", get(get_view).put(put_view))
        .route("/api/ws", get(ws_upgrade))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_bus_type(s: &str) -> Result<BusType, ApiError> {
    s.parse()
        .map_err(|_| ApiError::bad_request(format!("Unknown bus type: '{s}'")))
}

/// Optional bus index for aux-scoped settings/view requests
#[derive(Debug, Deserialize)]
struct BusQuery {
    bus: Option<u16>,
}

fn bus_target(bus_type: &str, query: &BusQuery) -> Result<BusTarget, ApiError> {
    match parse_bus_type(bus_type)? {
        BusType::Master => Ok(BusTarget::Master),
        BusType::Gain => Ok(BusTarget::Gain),
        BusType::Aux => query
            .bus
            .map(BusTarget::Aux)
            .ok_or_else(|| ApiError::bad_request("aux requires a ?bus= index")),
    }
}

/// GET /api/state/:bus_type/:bus - composite snapshot for one bus view
async fn get_state(
    Path((bus_type, bus)): Path<(String, u16)>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<AppState>, ApiError> {
    let bus_type = parse_bus_type(&bus_type)?;
    Ok(Json(state.store.get_state(bus_type, bus)))
}

/// PUT /api/channel/:bus_type/:bus/:id - merge a partial channel update
async fn put_channel(
    Path((bus_type, bus, id)): Path<(String, u16, u16)>,
    State(state): State<Arc<ApiState>>,
    Json(patch): Json<ChannelPatch>,
) -> Result<Json<ChannelState>, ApiError> {
    let bus_type = parse_bus_type(&bus_type)?;
    let Some(channel) = state.store.update_channel(bus_type, bus, id, &patch) else {
        return Err(ApiError::not_found(format!(
            "No channel {id} on {bus_type} bus {bus}"
        )));
    };
    state.clients.broadcast(&ServerMessage::Channel(channel.clone()));
    if let Some(link) = &state.link {
        if let Err(e) = link.set_param(bus_type, bus, id, patch).await {
            warn!("Failed to push channel update to mixer: {e:#}");
        }
    }
    Ok(Json(channel))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
}

/// PUT /api/aux/:id - rename an aux bus
async fn put_aux_name(
    Path(id): Path<u16>,
    State(state): State<Arc<ApiState>>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<AuxBusState>, ApiError> {
    let Some(aux) = state.store.update_aux_bus(id, &req.name) else {
        return Err(ApiError::not_found(format!("No aux bus {id}")));
    };
    state.clients.broadcast(&ServerMessage::Aux(aux.clone()));
    Ok(Json(aux))
}

/// GET /api/layout/aux/:bus - normalized section list for one aux bus
async fn get_aux_layout(
    Path(bus): Path<u16>,
    State(state): State<Arc<ApiState>>,
) -> Json<Vec<LayoutSection>> {
    Json(state.layout.get_aux_layout(bus))
}

/// PUT /api/layout/aux/:bus - replace one aux bus's section list
async fn put_aux_layout(
    Path(bus): Path<u16>,
    State(state): State<Arc<ApiState>>,
    Json(raw): Json<Value>,
) -> Result<Json<Vec<LayoutSection>>, ApiError> {
    state
        .layout
        .set_aux_layout(bus, &raw)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(state.layout.get_aux_layout(bus)))
}

/// GET /api/groups - global group list
async fn get_groups(State(state): State<Arc<ApiState>>) -> Json<Vec<GlobalGroup>> {
    Json(state.layout.get_global_groups())
}

/// PUT /api/groups - replace the global group list
async fn put_groups(
    State(state): State<Arc<ApiState>>,
    Json(raw): Json<Value>,
) -> Result<Json<Vec<GlobalGroup>>, ApiError> {
    state
        .layout
        .set_global_groups(&raw)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(state.layout.get_global_groups()))
}

/// GET /api/settings/:bus_type?bus= - group settings for one bus
async fn get_settings(
    Path(bus_type): Path<String>,
    Query(query): Query<BusQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<GroupSettings>, ApiError> {
    let target = bus_target(&bus_type, &query)?;
    Ok(Json(state.layout.get_global_settings(target)))
}

/// PUT /api/settings/:bus_type?bus= - replace group settings for one bus
async fn put_settings(
    Path(bus_type): Path<String>,
    Query(query): Query<BusQuery>,
    State(state): State<Arc<ApiState>>,
    Json(raw): Json<Value>,
) -> Result<Json<GroupSettings>, ApiError> {
    let target = bus_target(&bus_type, &query)?;
    state
        .layout
        .set_global_settings(target, &raw)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(state.layout.get_global_settings(target)))
}

/// GET /api/view/:bus_type?bus= - view settings for one bus
async fn get_view(
    Path(bus_type): Path<String>,
    Query(query): Query<BusQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ViewSettings>, ApiError> {
    let target = bus_target(&bus_type, &query)?;
    Ok(Json(state.layout.get_view_settings(target)))
}

/// PUT /api/view/:bus_type?bus= - replace view settings for one bus
async fn put_view(
    Path(bus_type): Path<String>,
    Query(query): Query<BusQuery>,
    State(state): State<Arc<ApiState>>,
    Json(raw): Json<Value>,
) -> Result<Json<ViewSettings>, ApiError> {
    let target = bus_target(&bus_type, &query)?;
    state
        .layout
        .set_view_settings(target, &raw)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(state.layout.get_view_settings(target)))
}

/// Registered WebSocket client backed by a per-connection queue
struct WsSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ClientSink for WsSink {
    fn send_text(&self, text: &str) -> bool {
        self.tx.send(text.to_string()).is_ok()
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// GET /api/ws - WebSocket subscription for push notifications
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Serialized full-state snapshot a client receives on connect
fn initial_snapshot(state: &ApiState) -> Result<String, serde_json::Error> {
    let snapshot = ServerMessage::State(state.store.get_state(BusType::Master, 0));
    serde_json::to_string(&snapshot)
}

/// Handle one WebSocket client: register, snapshot, then forward deltas
async fn handle_websocket(mut socket: WebSocket, state: Arc<ApiState>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id = state.clients.add(Arc::new(WsSink { tx }));
    debug!("WebSocket client {client_id} connected");

    // Full snapshot before any delta, so the client starts from a consistent
    // baseline rather than an arbitrary point in the stream
    match initial_snapshot(&state) {
        Ok(text) => {
            if socket.send(Message::Text(text.into())).await.is_err() {
                state.clients.remove(client_id);
                return;
            }
        }
        Err(e) => warn!("Failed to serialize initial snapshot: {e}"),
    }

    loop {
        tokio::select! {
            // Forward queued broadcasts to this client
            maybe_text = rx.recv() => {
                match maybe_text {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            debug!("WebSocket client {client_id} disconnected");
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Handle incoming messages (ping/pong, close)
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client {client_id} closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Clients talk to the REST surface; inbound WS data is ignored
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for client {client_id}: {e}");
                        break;
                    }
                }
            }
        }
    }

    state.clients.remove(client_id);
}

/// GET /api/health - health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
