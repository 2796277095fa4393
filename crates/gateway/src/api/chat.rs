//! Chat transport: one user message in, a stream of [`BusEvent`]s out.
//!
//! Exposed two ways over the same event vocabulary — an SSE stream for
//! simple clients, and a WebSocket upgrade for clients that want to send
//! a mid-turn stop request on the same connection they're reading from.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::runtime::bus::BusEvent;
use crate::runtime::turn::{cancel_turn, run_turn, TurnInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

fn is_terminal(event: &BusEvent) -> bool {
    matches!(event, BusEvent::TurnDone { .. } | BusEvent::TurnError { .. })
}

fn sse_event_name(event: &BusEvent) -> &'static str {
    match event {
        BusEvent::TurnStart => "turn.start",
        BusEvent::TextDelta { .. } => "text.delta",
        BusEvent::ToolCall { .. } => "tool.call",
        BusEvent::ToolResult { .. } => "tool.result",
        BusEvent::TurnDone { .. } => "turn.done",
        BusEvent::TurnError { .. } => "turn.error",
    }
}

fn make_sse_stream(
    mut rx: broadcast::Receiver<BusEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    let data = serde_json::json!({ "error": format!("subscriber lagged, dropped {n} events") }).to_string();
                    yield Ok(Event::default().event("turn.error").data(data));
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let terminal = is_terminal(&event);
            let name = sse_event_name(&event);
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            yield Ok(Event::default().event(name).data(data));
            if terminal {
                break;
            }
        }
    }
}

/// `POST /v1/sessions/:id/chat` — start a turn and stream it back as SSE.
pub async fn send_message_sse(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> impl IntoResponse {
    if let Err(e) = state
        .sessions
        .resolve_or_create(&session_id, body.model.as_deref().unwrap_or("default"))
    {
        let stream = futures_util::stream::once(async move {
            Ok::<_, std::convert::Infallible>(
                Event::default()
                    .event("turn.error")
                    .data(serde_json::json!({ "error": e.to_string() }).to_string()),
            )
        });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    }

    // Subscribe before starting the turn so `turn.start` is never missed.
    let rx = state.bus.subscribe(&session_id);

    let turn_state = state.turn_state();
    let input = TurnInput {
        session_id: session_id.clone(),
        user_message: body.message,
        model: body.model,
        transport: "rest".to_string(),
    };
    run_turn(turn_state, input);

    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `GET /v1/sessions/:id/chat/ws` — bidirectional chat over a WebSocket.
///
/// The client sends `{"message": "...", "model": "..."}` text frames to
/// start a turn, or `{"stop": true}` to cancel the turn in progress; the
/// server streams `BusEvent` JSON frames back on the same socket.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_ws(socket, state, session_id))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientFrame {
    Stop { stop: bool },
    Send(SendMessageBody),
}

async fn handle_chat_ws(mut socket: WebSocket, state: AppState, session_id: String) {
    loop {
        let text = match socket.recv().await {
            Some(Ok(WsMessage::Text(t))) => t,
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                let _ = socket
                    .send(WsMessage::Text(
                        serde_json::json!({ "type": "turn.error", "error": e.to_string() })
                            .to_string(),
                    ))
                    .await;
                continue;
            }
        };

        let body = match frame {
            ClientFrame::Stop { stop: true } => {
                cancel_turn(&state.turn_state(), &session_id);
                continue;
            }
            ClientFrame::Stop { stop: false } => continue,
            ClientFrame::Send(body) => body,
        };

        if let Err(e) = state
            .sessions
            .resolve_or_create(&session_id, body.model.as_deref().unwrap_or("default"))
        {
            let _ = socket
                .send(WsMessage::Text(
                    serde_json::json!({ "type": "turn.error", "error": e.to_string() }).to_string(),
                ))
                .await;
            continue;
        }

        let mut rx = state.bus.subscribe(&session_id);

        let turn_state = state.turn_state();
        let input = TurnInput {
            session_id: session_id.clone(),
            user_message: body.message,
            model: body.model,
            transport: "chat_ws".to_string(),
        };
        run_turn(turn_state, input);

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    let payload = serde_json::json!({
                        "type": "turn.error",
                        "error": format!("subscriber lagged, dropped {n} events"),
                    })
                    .to_string();
                    let _ = socket.send(WsMessage::Text(payload)).await;
                    return;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let terminal = is_terminal(&event);
            let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            if socket.send(WsMessage::Text(payload)).await.is_err() {
                return;
            }
            if terminal {
                break;
            }
        }
    }
}
