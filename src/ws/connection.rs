//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{EventRecord, SourceId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<Arc<EventRecord>>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(record) => {
                        if subs.matches(&SourceId::new(record.entity_id.as_str())) {
                            let msg = WsMessage {
                                id: uuid::Uuid::new_v4().to_string(),
                                msg_type: WsMessageType::Event,
                                timestamp: chrono::Utc::now(),
                                payload: serde_json::to_value(record.as_ref()).unwrap_or_default(),
                            };
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        let err = WsMessage {
            id: String::new(),
            msg_type: WsMessageType::Error,
            timestamp: chrono::Utc::now(),
            payload: serde_json::json!({
                "code": 400,
                "message": "malformed JSON"
            }),
        };
        return serde_json::to_string(&err).ok();
    };

    match serde_json::from_value::<WsCommand>(msg.payload.clone()) {
        Ok(WsCommand::Subscribe { source_ids }) => {
            let wildcard = source_ids.iter().any(|s| s == "*");
            let ids: Vec<SourceId> = source_ids
                .into_iter()
                .filter(|s| s != "*")
                .map(SourceId::new)
                .collect();
            let subscribed: Vec<String> = ids.iter().map(ToString::to_string).collect();
            subs.subscribe(ids, wildcard);

            let response = WsMessage {
                id: msg.id,
                msg_type: WsMessageType::Response,
                timestamp: chrono::Utc::now(),
                payload: serde_json::json!({
                    "subscribed": subscribed,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            };
            serde_json::to_string(&response).ok()
        }
        Ok(WsCommand::Unsubscribe { source_ids }) => {
            let wildcard = source_ids.iter().any(|s| s == "*");
            let ids: Vec<SourceId> = source_ids
                .into_iter()
                .filter(|s| s != "*")
                .map(SourceId::new)
                .collect();
            subs.unsubscribe(&ids, wildcard);

            let response = WsMessage {
                id: msg.id,
                msg_type: WsMessageType::Response,
                timestamp: chrono::Utc::now(),
                payload: serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                }),
            };
            serde_json::to_string(&response).ok()
        }
        Err(_) => {
            let err = WsMessage {
                id: msg.id,
                msg_type: WsMessageType::Error,
                timestamp: chrono::Utc::now(),
                payload: serde_json::json!({
                    "code": 404,
                    "message": "unknown command"
                }),
            };
            serde_json::to_string(&err).ok()
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn envelope(payload: serde_json::Value) -> String {
        serde_json::to_string(&WsMessage {
            id: "req-1".to_string(),
            msg_type: WsMessageType::Command,
            timestamp: chrono::Utc::now(),
            payload,
        })
        .unwrap_or_default()
    }

    #[test]
    fn subscribe_command_builds_filter() {
        let mut subs = SubscriptionManager::new();
        let text = envelope(serde_json::json!({
            "command": "subscribe",
            "source_ids": ["37623", "40891"],
        }));

        let response = handle_text_message(&text, &mut subs);
        let Some(json) = response else {
            panic!("expected response");
        };
        assert!(json.contains("\"response\""));
        assert!(subs.matches(&SourceId::new("37623")));
        assert!(!subs.matches(&SourceId::new("99999")));
    }

    #[test]
    fn wildcard_subscribe_and_unsubscribe() {
        let mut subs = SubscriptionManager::new();
        let subscribe = envelope(serde_json::json!({
            "command": "subscribe",
            "source_ids": ["*"],
        }));
        handle_text_message(&subscribe, &mut subs);
        assert!(subs.matches(&SourceId::new("anything")));

        let unsubscribe = envelope(serde_json::json!({
            "command": "unsubscribe",
            "source_ids": ["*"],
        }));
        handle_text_message(&unsubscribe, &mut subs);
        assert!(!subs.matches(&SourceId::new("anything")));
    }

    #[test]
    fn malformed_json_gets_error_envelope() {
        let mut subs = SubscriptionManager::new();
        let response = handle_text_message("not json", &mut subs);
        let Some(json) = response else {
            panic!("expected error envelope");
        };
        assert!(json.contains("\"error\""));
        assert!(json.contains("malformed JSON"));
    }

    #[test]
    fn unknown_command_gets_error_envelope() {
        let mut subs = SubscriptionManager::new();
        let text = envelope(serde_json::json!({
            "command": "drop_tables",
        }));
        let response = handle_text_message(&text, &mut subs);
        let Some(json) = response else {
            panic!("expected error envelope");
        };
        assert!(json.contains("unknown command"));
    }
}
