use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use diagram_repair::InboundMessage;
use futures_util::{sink::SinkExt, stream::StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::server::AppState;

/// WebSocket endpoint for browser render clients
///
/// The first frame is `{"type":"connected","connectionId":...}`. After that
/// the server sends `validate` and `progress` frames, and the client answers
/// each `validate` with a `verdict` quoting its `correlationId`.
#[instrument(skip(ws, state))]
pub async fn render_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    debug!("Render socket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, mut outbound) = state.connections.connect().await;
    info!(connection_id = %connection_id, "Render client connected");

    let (mut sender, mut receiver) = socket.split();

    // OUTBOUND: registry frames to the browser
    let out_id = connection_id.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(connection_id = %out_id, error = %e, "Failed to serialize render frame");
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!(connection_id = %out_id, error = %e, "Failed to send render frame");
                break;
            }
        }
        debug!(connection_id = %out_id, "Render sender task ended");
    });

    // INBOUND: verdicts from the browser
    let registry = state.connections.clone();
    let in_id = connection_id.clone();
    let mut receiver_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                    Ok(inbound) => {
                        let verdict = inbound.into_verdict();
                        debug!(
                            connection_id = %in_id,
                            correlation_id = %verdict.correlation_id,
                            success = verdict.success,
                            "Verdict received"
                        );
                        registry.deliver_verdict(&in_id, verdict).await;
                    }
                    Err(e) => {
                        warn!(
                            connection_id = %in_id,
                            error = %e,
                            frame_preview = %text.chars().take(200).collect::<String>(),
                            "Ignoring unparseable render frame"
                        );
                    }
                },
                Message::Close(_) => {
                    debug!(connection_id = %in_id, "Render client sent close");
                    break;
                }
                _ => {}
            }
        }
        debug!(connection_id = %in_id, "Render receiver task ended");
    });

    // Either side ending tears the connection down
    tokio::select! {
        _ = &mut sender_task => receiver_task.abort(),
        _ = &mut receiver_task => sender_task.abort(),
    }

    let released = state.connections.disconnect(&connection_id).await;
    info!(connection_id = %connection_id, released, "Render client disconnected");
}
