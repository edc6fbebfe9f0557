use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::notification::{NotificationKind, NotificationSettings, SettingsPatch};
use crate::services::delivery_service::DeliveryService;
use crate::services::notification_service::NotificationService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
    #[serde(default)]
    unread_only: bool,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    user: User,
    Query(params): Query<ListNotificationsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notifications = NotificationService::list(
        &state.db,
        user.id,
        params.page,
        params.page_size,
        params.unread_only,
    )
    .await?;
    let unread_count = NotificationService::unread_count(&state.db, user.id).await?;

    Ok(Json(serde_json::json!({
        "notifications": notifications,
        "unread_count": unread_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// POST /api/v1/notifications
/// Trigger endpoint for the other subsystems (comments, likes, follows…).
/// A recipient that disabled the kind yields `created: false`, not an
/// error.
pub async fn create_notification(
    State(state): State<AppState>,
    _user: User,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notification = DeliveryService::send_notification(
        &state,
        body.recipient_id,
        body.kind,
        &body.title,
        &body.message,
        body.link.as_deref(),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "created": notification.is_some(),
        "notification": notification,
    })))
}

/// GET /api/v1/notifications/unread-count
pub async fn notification_unread_count(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = NotificationService::unread_count(&state.db, user.id).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}

/// PUT /api/v1/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = NotificationService::mark_read(&state.db, id, user.id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// PUT /api/v1/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = NotificationService::mark_all_read(&state.db, user.id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// DELETE /api/v1/notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = NotificationService::delete(&state.db, id, user.id).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

/// GET /api/v1/notifications/settings
pub async fn get_settings(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<NotificationSettings>, AppError> {
    let settings = NotificationService::get_or_create_settings(&state.db, user.id).await?;
    Ok(Json(settings))
}

/// PUT /api/v1/notifications/settings
pub async fn update_settings(
    State(state): State<AppState>,
    user: User,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<NotificationSettings>, AppError> {
    let settings = NotificationService::update_settings(&state.db, user.id, patch).await?;
    Ok(Json(settings))
}
