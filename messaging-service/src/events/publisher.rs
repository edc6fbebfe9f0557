//! Best-effort fan-out of persistence events to live subscribers.
//!
//! Every event lands on the recipient's own channel and on one global
//! channel for monitoring consumers. Publishing is fire-and-forget: by the
//! time an event exists the durable write has already succeeded, so a lost
//! push is acceptable degradation and a publish failure never reaches the
//! caller.

use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::message::Message;
use crate::models::notification::Notification;

/// Channel every event is mirrored to, for monitoring/fan-out consumers.
pub const GLOBAL_CHANNEL: &str = "notification:all";

/// Per-recipient channel name.
pub fn user_channel(user_id: Uuid) -> String {
    format!("notification:user:{user_id}")
}

pub struct EventPublisher {
    conn: Option<ConnectionManager>,
    publish_timeout: Duration,
}

impl EventPublisher {
    /// Wrap an already-established connection (or `None` for disabled mode).
    pub fn new(conn: Option<ConnectionManager>, publish_timeout: Duration) -> Self {
        if conn.is_none() {
            warn!("no pub/sub transport, live event delivery disabled");
        }
        Self {
            conn,
            publish_timeout,
        }
    }

    /// Attempt the transport connection once. An unreachable backend leaves
    /// the publisher disabled for its lifetime; a fresh instance comes with
    /// the next process.
    pub async fn connect(redis_url: &str, publish_timeout: Duration) -> Self {
        match redis_utils::connect(redis_url).await {
            Ok(conn) => {
                info!("event publisher connected");
                Self::new(Some(conn), publish_timeout)
            }
            Err(e) => {
                warn!(error = %e, "pub/sub backend unreachable, live event delivery disabled");
                Self::new(None, publish_timeout)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    pub fn publish_message(&self, message: &Message) {
        self.publish(
            message.receiver_id,
            "message.new",
            serde_json::to_value(message),
        );
    }

    pub fn publish_notification(&self, notification: &Notification) {
        self.publish(
            notification.user_id,
            "notification.new",
            serde_json::to_value(notification),
        );
    }

    fn publish(
        &self,
        recipient: Uuid,
        event_type: &'static str,
        payload: Result<serde_json::Value, serde_json::Error>,
    ) {
        let Some(conn) = self.conn.clone() else {
            debug!(event_type, "publisher disabled, dropping event");
            return;
        };
        let payload = match payload {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, event_type, "failed to serialize event payload");
                return;
            }
        };

        let body = envelope(event_type, payload).to_string();
        let channel = user_channel(recipient);
        let timeout = self.publish_timeout;

        // Detached: the caller's response must not wait on the broadcast
        tokio::spawn(async move {
            let mut conn = conn;
            let result = tokio::time::timeout(timeout, async {
                conn.publish::<_, _, ()>(&channel, &body).await?;
                conn.publish::<_, _, ()>(GLOBAL_CHANNEL, &body).await
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, channel, "event publish failed"),
                Err(_) => warn!(channel, "event publish timed out"),
            }
        });
    }
}

/// Flat event envelope: `type` and `timestamp` alongside the payload's own
/// fields.
fn envelope(event_type: &str, payload: serde_json::Value) -> serde_json::Value {
    let mut body = serde_json::json!({
        "type": event_type,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let (Some(target), serde_json::Value::Object(fields)) = (body.as_object_mut(), payload) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_channel_is_keyed_by_recipient() {
        let id = Uuid::new_v4();
        assert_eq!(user_channel(id), format!("notification:user:{id}"));
    }

    #[test]
    fn envelope_flattens_payload_fields() {
        let payload = serde_json::json!({"id": "abc", "content": "hi"});
        let event = envelope("message.new", payload);

        assert_eq!(event["type"], "message.new");
        assert_eq!(event["id"], "abc");
        assert_eq!(event["content"], "hi");
        assert!(event["timestamp"].is_string());
    }

    #[tokio::test]
    async fn disabled_publisher_drops_events_without_error() {
        let publisher = EventPublisher::new(None, Duration::from_millis(500));
        assert!(!publisher.is_enabled());

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: "system".into(),
            title: "t".into(),
            message: "m".into(),
            link: None,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        // Must not panic or block
        publisher.publish_notification(&notification);
    }
}
