use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Upgrade to the meet channel.
pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let service = state.service.clone();
    let metrics = state.metrics.clone();
    ws.on_upgrade(move |socket| ws::handle_channel(socket, service, metrics))
}
