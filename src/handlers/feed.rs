//! # Live Feed Handler
//!
//! WebSocket endpoint that streams every record stored for one user, as JSON
//! text frames, from the moment of subscription until the client disconnects
//! or the server shuts down. Inbound frames other than close are ignored.

use axum::{
    extract::{
        Path, State,
        rejection::PathRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// Subscribe to records stored for a user
#[utoipa::path(
    get,
    path = "/ws/{user_id}",
    params(("user_id" = i32, Path, description = "User whose records are streamed")),
    responses(
        (status = 101, description = "Switching to WebSocket; each text frame is a ProcessedAgentRecord"),
        (status = 400, description = "user_id is not an integer", body = ApiError)
    ),
    tag = "feed"
)]
pub async fn subscribe_feed(
    State(state): State<AppState>,
    user_id: Result<Path<i32>, PathRejection>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Path(user_id) = user_id?;

    Ok(ws.on_upgrade(move |socket| stream_feed(socket, state, user_id)))
}

async fn stream_feed(mut socket: WebSocket, state: AppState, user_id: i32) {
    let mut rx = state.feed.subscribe(user_id).await;
    info!(user_id, "Feed subscriber connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }

            msg = rx.recv() => {
                match msg {
                    Ok(record) => {
                        let json = match serde_json::to_string(&record) {
                            Ok(json) => json,
                            Err(err) => {
                                warn!(user_id, error = %err, "Failed to serialize feed record");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id, skipped, "Feed subscriber lagging; records dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(user_id, error = %err, "Feed socket error");
                        break;
                    }
                }
            }
        }
    }

    drop(rx);
    state.feed.prune(user_id).await;
    info!(user_id, "Feed subscriber disconnected");
}
