use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub mod conversations;
use conversations::{create_conversation, list_conversations};
pub mod messages;
use messages::{
    delete_message, list_messages, mark_all_read, mark_message_read, message_unread_count,
    popular_search_terms, search_messages, send_message,
};
pub mod notifications;
use notifications::{
    create_notification, delete_notification, get_settings, list_notifications,
    mark_all_notifications_read, mark_notification_read, notification_unread_count,
    update_settings,
};

pub fn build_router() -> Router<AppState> {
    let api_v1 = Router::new()
        // Conversations
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route("/conversations/:id/messages", get(list_messages))
        .route("/conversations/:id/read-all", post(mark_all_read))
        // Messages
        .route("/messages", post(send_message))
        .route("/messages/search", get(search_messages))
        .route("/messages/search/popular", get(popular_search_terms))
        .route("/messages/unread-count", get(message_unread_count))
        .route("/messages/:id/read", post(mark_message_read))
        .route("/messages/:id", delete(delete_message))
        // Notifications
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/unread-count", get(notification_unread_count))
        .route("/notifications/read-all", put(mark_all_notifications_read))
        .route(
            "/notifications/settings",
            get(get_settings).put(update_settings),
        )
        .route("/notifications/:id/read", put(mark_notification_read))
        .route("/notifications/:id", delete(delete_notification));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api/v1", api_v1)
}
