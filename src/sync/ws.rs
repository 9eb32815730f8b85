use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::event::{ClientFrame, Event};
use crate::session::CurrentUser;

use super::SyncEngine;

/// One socket per user session; a user may hold several (multi-device).
#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    CurrentUser(user_id): CurrentUser,
    State(engine): State<SyncEngine>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(engine, user_id, socket))
}

async fn handle_socket(engine: SyncEngine, user_id: i64, socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reply = tx.clone();
    let connection_id = engine.connect(user_id, tx);
    tracing::info!(user_id, %connection_id, "session connected");

    let (mut sink, mut stream) = socket.split();

    // Outbound queue drain. The engine only ever enqueues; this task is the
    // single writer on the socket, so a stalled peer stalls nobody else.
    let mut forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(payload) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(frame)) = frame else { break };
                let WsMessage::Text(text) = frame else { continue };
                let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                    continue;
                };

                // Operation failures go back on the same connection; they
                // never tear the socket down.
                if let Err(err) = dispatch(&engine, user_id, frame).await {
                    tracing::debug!(user_id, %connection_id, error = %err, "frame rejected");
                    let _ = reply.send(Event::Error {
                        message: err.to_string(),
                    });
                }
            }
            _ = &mut forward => break,
        }
    }

    forward.abort();
    engine.disconnect(connection_id);
    tracing::info!(user_id, %connection_id, "session disconnected");
}

async fn dispatch(engine: &SyncEngine, user_id: i64, frame: ClientFrame) -> AppResult<()> {
    match frame {
        ClientFrame::Send {
            conversation_id,
            content,
        } => {
            engine.send_message(user_id, conversation_id, &content).await?;
        }
        ClientFrame::Typing {
            conversation_id,
            is_typing,
        } => {
            engine.notify_typing(user_id, conversation_id, is_typing).await?;
        }
    }

    Ok(())
}
