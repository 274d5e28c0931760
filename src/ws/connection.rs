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
use crate::domain::{DomainEvent, EventId};
use crate::service::VotingService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<DomainEvent>,
    voting_service: Arc<VotingService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &voting_service).await;
                        let json = serde_json::to_string(&reply).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(domain_event) => {
                        if subs.matches(domain_event.event_id()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&domain_event).unwrap_or_default(),
                            );
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

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    voting_service: &VotingService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { event_ids } => {
            let (ids, wildcard) = parse_event_ids(&event_ids);
            subs.subscribe(&ids, wildcard);
            tracing::debug!(count = subs.count(), wildcard, "ws subscribe");
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { event_ids } => {
            let (ids, wildcard) = parse_event_ids(&event_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetTally { event_id } => {
            let Ok(uuid) = event_id.parse::<uuid::Uuid>() else {
                return WsMessage::error(msg.id, 400, "invalid event_id");
            };
            match voting_service.live_tally(EventId::from_uuid(uuid)).await {
                Ok(tally) => WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(&tally).unwrap_or_default(),
                ),
                Err(err) => WsMessage::error(msg.id, err.error_code(), &err.to_string()),
            }
        }
    }
}

/// Splits raw IDs into parsed event IDs and the `"*"` wildcard flag.
/// Unparsable IDs are ignored.
fn parse_event_ids(raw: &[String]) -> (Vec<EventId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(EventId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_ids_with_wildcard_and_garbage() {
        let id = EventId::new();
        let raw = vec!["*".to_string(), id.to_string(), "nope".to_string()];
        let (ids, wildcard) = parse_event_ids(&raw);
        assert!(wildcard);
        assert_eq!(ids, vec![id]);
    }

    #[tokio::test]
    async fn get_tally_for_unknown_event_is_an_error() {
        let registry = Arc::new(crate::domain::EventRegistry::new());
        let voting = VotingService::new(registry, crate::domain::EventBus::new(16));
        let mut subs = SubscriptionManager::new();
        let text = format!(
            r#"{{"id":"7","type":"command","payload":{{"command":"get_tally","event_id":"{}"}}}}"#,
            EventId::new()
        );
        let reply = handle_text_message(&text, &mut subs, &voting).await;
        assert_eq!(reply.id, "7");
        assert_eq!(reply.msg_type, WsMessageType::Error);
    }

    #[tokio::test]
    async fn subscribe_reply_reports_count() {
        let registry = Arc::new(crate::domain::EventRegistry::new());
        let voting = VotingService::new(registry, crate::domain::EventBus::new(16));
        let mut subs = SubscriptionManager::new();
        let text = format!(
            r#"{{"id":"1","type":"command","payload":{{"command":"subscribe","event_ids":["{}"]}}}}"#,
            EventId::new()
        );
        let reply = handle_text_message(&text, &mut subs, &voting).await;
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.payload.get("count"), Some(&serde_json::json!(1)));
    }
}
