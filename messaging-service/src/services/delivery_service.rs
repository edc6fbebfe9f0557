//! Orchestration of the send/read paths.
//!
//! A send runs: resolve conversation -> persist message -> refresh the
//! last-message pointer -> broadcast. Only the first two steps can fail the
//! caller; the pointer update degrades to stale list ordering and the
//! broadcast is fire-and-forget.

use tracing::warn;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::message::{Message, NewMessage};
use crate::models::notification::{Notification, NotificationKind};
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::state::AppState;

pub struct DeliveryService;

impl DeliveryService {
    /// Deliver a direct message from `sender_id` to `receiver_id`, creating
    /// the conversation on first contact.
    pub async fn send_message(
        state: &AppState,
        sender_id: Uuid,
        receiver_id: Uuid,
        payload: NewMessage,
    ) -> AppResult<Message> {
        let conversation =
            ConversationService::find_or_create(&state.db, sender_id, receiver_id).await?;
        let message =
            MessageService::send(&state.db, conversation.id, sender_id, receiver_id, payload)
                .await?;

        if let Err(e) =
            ConversationService::touch_last_message(&state.db, conversation.id, message.id).await
        {
            // The message is durable; only list ordering goes stale until
            // the next successful send
            warn!(
                error = %e,
                conversation_id = %conversation.id,
                "failed to update last-message pointer"
            );
        }

        state.events.publish_message(&message);
        Ok(message)
    }

    /// Read receipt for a single message. Unread counters are recomputed on
    /// demand by list queries, so nothing else needs updating here.
    pub async fn read_receipt(
        state: &AppState,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<Message> {
        MessageService::mark_read(&state.db, message_id, reader_id).await
    }

    /// Create a notification and broadcast it to the recipient's channel.
    /// `None` means the recipient has the kind disabled.
    pub async fn send_notification(
        state: &AppState,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        let notification =
            NotificationService::create(&state.db, user_id, kind, title, message, link).await?;
        if let Some(notification) = &notification {
            state.events.publish_notification(notification);
        }
        Ok(notification)
    }
}
