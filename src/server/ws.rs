//! WebSocket handshake and per-session message loop for `/realtime/ws`.
//!
//! The reconnect-token handshake mirrors the HTTP lobby-join path: verify the claimed session,
//! then require the presented token to re-derive the same claims before the socket is ever
//! upgraded. Everything after the upgrade is a thin forwarding loop: inbound `subscribe` frames
//! bind rooms on the broker, outbound frames are whatever the broker hands back over the
//! session's sink.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::broker::RoomId;
use crate::ids::SessionId;
use crate::protocol::adapter::ProtocolAdapter;
use crate::protocol::wire::WireEnvelope;
use crate::token::TokenVerifyExpectations;

use super::routes::ServerContext;

const LOG_TARGET: &str = "server::ws";
const TOKEN_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;
const TOKEN_CLOCK_SKEW_MS: u64 = 1_000;

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    session_id: SessionId,
    reconnect_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe {
        lobby_id: Option<crate::ids::LobbyId>,
        game_id: Option<crate::ids::GameId>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum ServerFrame {
    WsReady {
        session_id: SessionId,
        lobby_id: crate::ids::LobbyId,
        game_id: Option<crate::ids::GameId>,
    },
    WsSubscribed {
        rooms: Vec<String>,
    },
    WsError {
        message: String,
    },
}

pub async fn realtime_ws(
    State(ctx): State<ServerContext>,
    Query(query): Query<RealtimeQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let dispatcher = ctx.dispatcher.clone();
    let now = dispatcher.clock_now();

    let Some(session) = dispatcher.session_store().get_by_id(&query.session_id) else {
        return (StatusCode::UNAUTHORIZED, "unknown session").into_response();
    };
    if let Some(reconnect_by) = session.reconnect_by_ms {
        if now > reconnect_by {
            return (StatusCode::FORBIDDEN, "reconnect window expired").into_response();
        }
    }

    let verify = dispatcher.token_codec().verify(
        &query.reconnect_token,
        &TokenVerifyExpectations {
            session_id: &session.session_id,
            lobby_id: &session.lobby_id,
            player_id: Some(&session.player_id),
            now_ms: now,
            max_age_ms: TOKEN_MAX_AGE_MS,
            allowed_clock_skew_ms: TOKEN_CLOCK_SKEW_MS,
        },
    );
    if let Err(err) = verify {
        tracing::info!(target = LOG_TARGET, session_id = %session.session_id, %err, "ws handshake rejected");
        return (StatusCode::FORBIDDEN, "invalid reconnect token").into_response();
    }

    upgrade.on_upgrade(move |socket| handle_socket(socket, ctx, session))
}

async fn handle_socket(
    socket: WebSocket,
    ctx: ServerContext,
    session: crate::domain::SessionRecord,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WireEnvelope>();
    let dispatcher = ctx.dispatcher.clone();
    dispatcher
        .broker()
        .connect_session(session.session_id.clone(), tx);

    let ready = ServerFrame::WsReady {
        session_id: session.session_id.clone(),
        lobby_id: session.lobby_id.clone(),
        game_id: session.game_id.clone(),
    };
    if send_server_frame(&mut sink, &ready).await.is_err() {
        dispatcher.broker().disconnect_session(&session.session_id);
        return;
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(envelope) => {
                        let text = serde_json::to_string(&envelope).expect("wire envelopes always serialize");
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_frame(&ctx, &session, &text, &mut sink).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_))) => {
                        let _ = sink
                            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                                code: 1003,
                                reason: "binary frames are not supported".into(),
                            })))
                            .await;
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::info!(target = LOG_TARGET, session_id = %session.session_id, %err, "ws read error");
                        break;
                    }
                }
            }
        }
    }

    dispatcher.broker().disconnect_session(&session.session_id);
}

/// Handles one parsed `subscribe` frame: binds rooms on the broker, sends catchup state, then
/// `ws.subscribed`. Returns `false` when the connection must close (fatal gameId mismatch).
async fn handle_client_frame(
    ctx: &ServerContext,
    session: &crate::domain::SessionRecord,
    text: &str,
    sink: &mut SplitSink<WebSocket, Message>,
) -> bool {
    let frame: Result<ClientFrame, _> = serde_json::from_str(text);
    let ClientFrame::Subscribe { lobby_id, game_id } = match frame {
        Ok(frame) => frame,
        Err(_) => {
            let _ = sink
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: 1003,
                    reason: "malformed frame".into(),
                })))
                .await;
            return false;
        }
    };

    if let Some(requested_game_id) = &game_id {
        if session.game_id.as_ref() != Some(requested_game_id) {
            let _ = sink
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: 1008,
                    reason: "gameId does not match session".into(),
                })))
                .await;
            return false;
        }
    }

    if let Some(requested_lobby_id) = &lobby_id {
        if requested_lobby_id != &session.lobby_id {
            let error = ServerFrame::WsError {
                message: "lobbyId does not match session".to_string(),
            };
            return send_server_frame(sink, &error).await.is_ok();
        }
    }

    let mut rooms = Vec::new();
    let broker = ctx.dispatcher.broker();
    let lobby_room = RoomId::lobby(&session.lobby_id);
    broker.join_room(&session.session_id, lobby_room.clone());
    rooms.push(lobby_room.to_string());

    if let Some(lobby) = ctx.dispatcher.lobby_store().get_by_id(&session.lobby_id) {
        let event = ProtocolAdapter::to_lobby_state_event(&lobby);
        if send_outbound(sink, event).await.is_err() {
            return false;
        }
    }

    if let Some(game_id) = &session.game_id {
        let game_room = RoomId::game(game_id);
        broker.join_room(&session.session_id, game_room.clone());
        rooms.push(game_room.to_string());

        if let Some(game) = ctx.dispatcher.game_store().get_by_id(game_id) {
            let state_event = ProtocolAdapter::to_game_state_event(&game);
            if send_outbound(sink, state_event).await.is_err() {
                return false;
            }
            if let Some(lobby) = ctx.dispatcher.lobby_store().get_by_id(&session.lobby_id) {
                if let Some(seat) = lobby.seat_of_player(&session.player_id) {
                    let private_event = ProtocolAdapter::to_game_private_state_event(&game, seat);
                    if send_outbound(sink, private_event).await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    let subscribed = ServerFrame::WsSubscribed { rooms };
    send_server_frame(sink, &subscribed).await.is_ok()
}

async fn send_outbound(
    sink: &mut SplitSink<WebSocket, Message>,
    event: crate::protocol::wire::OutboundEvent,
) -> Result<(), axum::Error> {
    let envelope = WireEnvelope::new(event, None);
    let text = serde_json::to_string(&envelope).expect("wire envelopes always serialize");
    sink.send(Message::Text(text)).await
}

async fn send_server_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).expect("server frames always serialize");
    sink.send(Message::Text(text)).await
}

