use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::conversation::Conversation;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub peer_id: Uuid,
}

/// POST /api/v1/conversations
/// Find or create the 1:1 conversation with a peer.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = ConversationService::find_or_create(&state.db, user.id, body.peer_id).await?;
    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
    #[serde(default)]
    search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// GET /api/v1/conversations
/// Most-recent-activity-first list with unread counts.
pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
    Query(params): Query<ListConversationsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (conversations, total) = ConversationService::list_for_user(
        &state.db,
        user.id,
        params.page,
        params.page_size,
        params.search.as_deref(),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "conversations": conversations,
        "total": total,
        "page": params.page,
        "page_size": params.page_size,
    })))
}
