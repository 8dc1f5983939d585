//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ConnectionId;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::dispatch;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::registry::ConnectionRegistry;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id: ConnectionId = Uuid::new_v4();
    info!(connection_id = %connection_id, "New push-channel connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Register the outbound channel before any frame can address us
    let (outbound_tx, mut outbound_rx) = ConnectionRegistry::channel();
    state.connections.register(connection_id, outbound_tx);

    // Writer task: queued server frames -> socket
    let writer_conn = connection_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %writer_conn, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: client frames -> dispatch -> outbox delivery
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(connection_id = %connection_id, "Rate limited push-channel frame");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let outbox = dispatch::handle_message(&state, connection_id, msg);
                        state.connections.deliver(outbox);
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client frame");
                        state.connections.deliver(vec![(
                            connection_id,
                            ServerMsg::Error {
                                code: "invalid_message".to_string(),
                                message: e.to_string(),
                            },
                        )]);
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary frame, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Transport disconnect: unbind via table lookup and notify the peer
    let outbox = dispatch::handle_disconnect(&state, connection_id);
    state.connections.deliver(outbox);
    state.connections.unregister(connection_id);

    writer_handle.abort();

    info!(connection_id = %connection_id, "Push-channel connection closed");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
