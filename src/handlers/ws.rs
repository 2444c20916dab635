use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::context::AppContext;
use crate::error::AppError;
use crate::message::{ClientEvent, MessageDraft, ServerEvent};
use crate::registry::SessionHandle;

/// GET /ws
pub async fn ws_upgrade(State(ctx): State<AppContext>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Per-connection event loop.
///
/// The connection starts unbound: until a `join` verifies a token, nothing
/// is pushed and `send` is rejected. After `join` the session is registered
/// and receives `receive` pushes through its bounded channel. On any exit
/// path the session is unregistered, so a closed connection can no longer
/// be a push target.
async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (push_tx, mut push_rx) = mpsc::channel::<ServerEvent>(ctx.config.push_buffer_size);
    let mut session: Option<SessionHandle> = None;

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let Some(Ok(frame)) = incoming else { break };
                match frame {
                    WsMessage::Text(text) => {
                        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::debug!(error = %e, "Malformed client event");
                                let error = protocol_error("MALFORMED_EVENT", "could not parse event");
                                if send_event(&mut ws_tx, &error).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        match event {
                            ClientEvent::Join { token } => {
                                match ctx.auth.verify_token(&token) {
                                    Ok(user_id) => {
                                        // Re-joining replaces the previous binding.
                                        if let Some(old) = session.take() {
                                            ctx.registry.unregister(&old).await;
                                        }
                                        let handle = ctx.registry.register(user_id, push_tx.clone()).await;
                                        tracing::info!(user_id = %user_id, session_id = %handle.id, "Live session joined");
                                        session = Some(handle);

                                        if send_event(&mut ws_tx, &ServerEvent::Joined { user_id }).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        if send_event(&mut ws_tx, &error_event(&e)).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            ClientEvent::Send { receiver_id, item_ref, text } => {
                                let Some(handle) = session.as_ref() else {
                                    let error = protocol_error("UNAUTHENTICATED", "join before sending");
                                    if send_event(&mut ws_tx, &error).await.is_err() {
                                        break;
                                    }
                                    continue;
                                };

                                let draft = MessageDraft { receiver_id, item_ref, text };
                                // The created message reaches this session as a
                                // `receive` push, the same as every other session
                                // of both parties.
                                if let Err(e) = ctx.delivery.send(handle.user_id, draft).await {
                                    e.log();
                                    if send_event(&mut ws_tx, &error_event(&e)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    WsMessage::Close(_) => break,
                    // axum answers pings itself; binary frames are not part
                    // of the protocol.
                    _ => {}
                }
            }

            pushed = push_rx.recv() => {
                let Some(event) = pushed else { break };
                if send_event(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(handle) = session {
        ctx.registry.unregister(&handle).await;
        tracing::info!(user_id = %handle.user_id, session_id = %handle.id, "Live session closed");
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event)
        .map_err(|e| axum::Error::new(e))?;
    ws_tx.send(WsMessage::Text(json.into())).await
}

fn error_event(error: &AppError) -> ServerEvent {
    ServerEvent::Error {
        code: error.error_code().to_string(),
        reason: error.user_message(),
    }
}

fn protocol_error(code: &str, reason: &str) -> ServerEvent {
    ServerEvent::Error {
        code: code.to_string(),
        reason: reason.to_string(),
    }
}
