use crate::{
    error::Result,
    models::{notification::*, response::ApiResponse},
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", put(mark_all_as_read))
        .route("/:id/read", put(mark_as_read))
}

/// Get the caller's notifications, newest first
/// GET /notifications
async fn get_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>> {
    debug!("Getting notifications for user: {}", user.id);

    let notifications = state
        .notification_service
        .get_user_notifications(&user.id, query.unread_only.unwrap_or(false))
        .await?;

    Ok(Json(ApiResponse::success(notifications)))
}

/// GET /notifications/unread-count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Value>>> {
    let count = state.notification_service.unread_count(&user.id).await?;
    Ok(Json(ApiResponse::success(json!({ "unreadCount": count }))))
}

/// Mark one notification as read
/// PUT /notifications/:id/read
async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<Notification>>> {
    let notification = state
        .notification_service
        .mark_as_read(&user.id, &notification_id)
        .await?;

    Ok(Json(ApiResponse::success(notification)))
}

/// Mark all of the caller's notifications as read
/// PUT /notifications/read-all
async fn mark_all_as_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Value>>> {
    let marked = state.notification_service.mark_all_as_read(&user.id).await?;
    Ok(Json(ApiResponse::success(json!({ "marked": marked }))))
}
