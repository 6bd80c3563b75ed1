//! WebSocket endpoint: connection lifecycle and client frame handling.
//!
//! A client connects to `/ws`, is registered with the
//! [`ConnectionManager`], and from then on receives every broadcast. It
//! sends `Subscribe` / `Unsubscribe` frames to manage targeted delivery;
//! the hub acknowledges each one or answers with an `Error` frame.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use opsboard_proto::hub::{self, HubMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::router::{ConnectionId, ConnectionManager};

/// Default maximum client frame size in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4096;

/// Shared state for the WebSocket endpoint.
pub struct HubState {
    /// Connection and room registry; also the engine's notifier.
    pub router: Arc<ConnectionManager>,
    max_frame_size: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new(Arc::new(ConnectionManager::new()))
    }
}

impl HubState {
    /// Creates state over an existing router with the default frame limit.
    #[must_use]
    pub const fn new(router: Arc<ConnectionManager>) -> Self {
        Self::with_frame_limit(router, DEFAULT_MAX_FRAME_SIZE)
    }

    #[must_use]
    pub const fn with_frame_limit(router: Arc<ConnectionManager>, max_frame_size: usize) -> Self {
        Self {
            router,
            max_frame_size,
        }
    }
}

/// Serves one upgraded WebSocket until either side closes.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn = state.router.connect(tx).await;
    tracing::info!(conn = %conn, "client connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn = %conn, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => handle_frame(conn, &data, &reader_state).await,
                Message::Close(_) => {
                    tracing::info!(conn = %conn, "received close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.router.disconnect(conn).await;
    tracing::info!(conn = %conn, "client disconnected");
}

/// Handles one binary frame from a client.
async fn handle_frame(conn: ConnectionId, data: &[u8], state: &HubState) {
    if data.len() > state.max_frame_size {
        tracing::warn!(
            conn = %conn,
            size = data.len(),
            max = state.max_frame_size,
            "frame exceeds size limit"
        );
        reply(
            state,
            conn,
            HubMessage::Error {
                reason: format!(
                    "frame too large: {} bytes (max {})",
                    data.len(),
                    state.max_frame_size
                ),
            },
        )
        .await;
        return;
    }

    let msg = match hub::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(conn = %conn, error = %e, "failed to decode frame");
            reply(
                state,
                conn,
                HubMessage::Error {
                    reason: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let response = match msg {
        HubMessage::Subscribe { room } => match state.router.join(conn, &room).await {
            Ok(_) => {
                tracing::info!(conn = %conn, room = %room, "subscribed");
                HubMessage::Subscribed { room }
            }
            Err(e) => {
                tracing::warn!(conn = %conn, room = %room, error = %e, "subscribe rejected");
                HubMessage::Error {
                    reason: e.to_string(),
                }
            }
        },
        HubMessage::Unsubscribe { room } => {
            let was_member = state.router.leave(conn, &room).await;
            tracing::info!(conn = %conn, room = %room, was_member, "unsubscribed");
            HubMessage::Unsubscribed { room }
        }
        other => {
            tracing::warn!(conn = %conn, msg = ?other, "unexpected frame from client");
            HubMessage::Error {
                reason: "unexpected frame".to_string(),
            }
        }
    };
    reply(state, conn, response).await;
}

async fn reply(state: &HubState, conn: ConnectionId, msg: HubMessage) {
    if let Err(e) = state.router.send_to(conn, &msg).await {
        tracing::debug!(conn = %conn, error = %e, "reply not delivered");
    }
}

/// Starts the hub on `addr` with fresh state and returns the bound address
/// and the server task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(HubState::default())).await
}

/// Starts the hub with pre-built [`HubState`], typically sharing its router
/// with a [`opsboard::dispatch::Dispatcher`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<HubState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
