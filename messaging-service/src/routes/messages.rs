use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::message::{Message, NewMessage};
use crate::services::delivery_service::DeliveryService;
use crate::services::message_service::MessageService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    #[serde(flatten)]
    pub message: NewMessage,
}

/// POST /api/v1/messages
/// Send a direct message; the conversation is resolved (or created) from
/// the sender/receiver pair.
pub async fn send_message(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let message =
        DeliveryService::send_message(&state, user.id, body.receiver_id, body.message).await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
    #[serde(default)]
    before_id: Option<Uuid>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

/// GET /api/v1/conversations/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<ListMessagesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (messages, total, has_more) = MessageService::list(
        &state.db,
        conversation_id,
        user.id,
        params.page,
        params.page_size,
        params.before_id,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "messages": messages,
        "total": total,
        "has_more": has_more,
    })))
}

/// POST /api/v1/messages/:id/read
pub async fn mark_message_read(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let message = DeliveryService::read_receipt(&state, message_id, user.id).await?;
    Ok(Json(message))
}

/// POST /api/v1/conversations/:id/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = MessageService::mark_all_read(&state.db, conversation_id, user.id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// DELETE /api/v1/messages/:id
pub async fn delete_message(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    MessageService::soft_delete(&state.db, message_id, user.id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct SearchMessagesQuery {
    q: String,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

/// GET /api/v1/messages/search
pub async fn search_messages(
    State(state): State<AppState>,
    user: User,
    Query(params): Query<SearchMessagesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (messages, total) = MessageService::search(
        &state.db,
        user.id,
        &params.q,
        params.page,
        params.page_size,
    )
    .await?;

    // Popularity tracking is best-effort and never blocks the response
    state.trends.record(&params.q);

    Ok(Json(serde_json::json!({
        "messages": messages,
        "total": total,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PopularTermsQuery {
    #[serde(default = "default_popular_limit")]
    limit: usize,
}

fn default_popular_limit() -> usize {
    10
}

/// GET /api/v1/messages/search/popular
pub async fn popular_search_terms(
    State(state): State<AppState>,
    _user: User,
    Query(params): Query<PopularTermsQuery>,
) -> Json<serde_json::Value> {
    let terms: Vec<serde_json::Value> = state
        .trends
        .popular(params.limit.min(50))
        .await
        .into_iter()
        .map(|(term, score)| serde_json::json!({ "term": term, "score": score }))
        .collect();

    Json(serde_json::json!({ "terms": terms }))
}

/// GET /api/v1/messages/unread-count
pub async fn message_unread_count(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = MessageService::unread_count(&state.db, user.id).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}
