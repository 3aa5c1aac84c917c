use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::jwt;

/// Fan-out bus for realtime events (new messages, notifications, feed
/// changes). Subscribers get advisory triggers, not authoritative deltas:
/// a lagged receiver simply re-fetches through the REST endpoints.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<String>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event addressed to one user. Send errors only mean there
    /// are no subscribers right now, which is fine.
    pub fn publish(&self, kind: &str, user_id: Uuid, payload: serde_json::Value) {
        let event = json!({
            "kind": kind,
            "user_id": user_id,
            "payload": payload,
        });
        let _ = self.tx.send(event.to_string());
    }

    /// Publish an event with no addressee. Every connected subscriber
    /// receives it; clients filter by payload (feed refresh triggers).
    pub fn publish_broadcast(&self, kind: &str, payload: serde_json::Value) {
        let event = json!({
            "kind": kind,
            "payload": payload,
        });
        let _ = self.tx.send(event.to_string());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// Addressed events go to their recipient only; events without a
/// `user_id` are broadcasts and go to everyone.
fn delivers_to(event: &serde_json::Value, user_id: Uuid) -> bool {
    match event.get("user_id").and_then(|v| v.as_str()) {
        Some(recipient) => Uuid::parse_str(recipient).ok() == Some(user_id),
        None => true,
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// GET /api/events
///
/// Streams the caller's events as SSE. This is the push half of the
/// staleness bound; clients also poll the REST endpoints for periodic
/// reconciliation. Dropping the connection is the cancellation.
pub async fn user_events_sse(
    State(bus): State<EventBus>,
    claims: jwt::Claims,
) -> impl IntoResponse {
    let rx = bus.subscribe();
    let user_id = claims.sub;

    let s = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event_str) => {
                    let event: serde_json::Value = match serde_json::from_str(&event_str) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if delivers_to(&event, user_id) {
                        let kind = event
                            .get("kind")
                            .and_then(|v| v.as_str())
                            .unwrap_or("event")
                            .to_string();
                        let sse_event = Event::default().data(event.to_string()).event(kind);
                        return Some((Ok::<Event, Infallible>(sse_event), rx));
                    }
                    // Someone else's event, keep waiting
                }
                // Lagged receivers skip ahead; a fresh poll will reconcile
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressed_event_only_reaches_recipient() {
        let recipient = Uuid::new_v4();
        let other = Uuid::new_v4();
        let event = json!({
            "kind": "message:new",
            "user_id": recipient,
            "payload": {},
        });

        assert!(delivers_to(&event, recipient));
        assert!(!delivers_to(&event, other));
    }

    #[test]
    fn broadcast_event_reaches_everyone() {
        let event = json!({
            "kind": "confession:new",
            "payload": { "college_id": Uuid::new_v4() },
        });

        assert!(delivers_to(&event, Uuid::new_v4()));
        assert!(delivers_to(&event, Uuid::new_v4()));
    }

    #[tokio::test]
    async fn broadcast_publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let confession_id = Uuid::new_v4();

        bus.publish_broadcast(
            "confession:new",
            json!({ "confession_id": confession_id }),
        );

        let raw = rx.recv().await.unwrap();
        let event: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(event["kind"], "confession:new");
        assert!(event.get("user_id").is_none());
        assert_eq!(
            event["payload"]["confession_id"],
            json!(confession_id)
        );
    }
}
