use crate::room::RegistryHandle;
use crate::signaling::PeerSinks;
use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tincan_core::{ConnId, IceServerConfig, RoomId, Signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub sinks: PeerSinks,
    pub ice_servers: Vec<IceServerConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms/{room_id}", get(room_exists))
        .route("/ice-servers", get(ice_servers))
        .with_state(state)
}

/// Pre-join probe: does this room id exist (i.e. was it created and not yet
/// invalidated)?
async fn room_exists(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Json<bool> {
    Json(state.registry.room_exists(RoomId::from(room_id)).await)
}

async fn ice_servers(State(state): State<AppState>) -> Json<Vec<IceServerConfig>> {
    Json(state.ice_servers.clone())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let conn = ConnId::new();
    ws.on_upgrade(move |socket| handle_socket(socket, conn, state))
}

async fn handle_socket(socket: WebSocket, conn: ConnId, state: AppState) {
    info!("New WebSocket connection: {conn}");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.sinks.add(conn, tx);
    state.registry.register(conn).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
        // Either the sink was dropped (eviction) or the socket broke; make
        // sure the client sees a close frame in the former case.
        let _ = sender.close().await;
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<Signal>(&text) {
                Ok(signal) => dispatch(&state, conn, signal).await,
                Err(e) => warn!("Malformed signal from {conn}: {e}"),
            },
            Message::Pong(_) => state.registry.pong(conn).await,
            Message::Close(_) => break,
            Message::Binary(_) => warn!("Unexpected binary frame from {conn}"),
            Message::Ping(_) => {}
        }
    }

    state.registry.disconnect(conn).await;
    state.sinks.remove(&conn);
    send_task.abort();
    info!("WebSocket disconnected: {conn}");
}

async fn dispatch(state: &AppState, conn: ConnId, signal: Signal) {
    match signal {
        Signal::CreateRoom { room_id } => state.registry.create_room(conn, room_id).await,
        Signal::Join { room_id } => state.registry.join(conn, room_id).await,

        signal @ (Signal::Offer { .. }
        | Signal::Answer { .. }
        | Signal::IceCandidate { .. }
        | Signal::Restart
        | Signal::CheckPeer
        | Signal::PeerReady) => {
            debug!("Relaying {signal:?} from {conn}");
            state.registry.relay(conn, signal).await;
        }

        Signal::Joined { .. }
        | Signal::Ready
        | Signal::PeerDisconnected
        | Signal::Error { .. } => {
            warn!("Client {conn} sent a relay-origin signal, dropping");
        }
    }
}
