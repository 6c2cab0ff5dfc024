use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use super::notification_dto::{CreateNotificationRequest, NotificationResponse};
use crate::{error::Result, middleware::Owner, state::AppState};

/// Schedule a push notification
#[utoipa::path(
    post,
    path = "/api/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification scheduled", body = NotificationResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid token")
    ),
    tag = "notifications",
    security((), ("bearer_auth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let notification = state.notification_service.create(owner_id, payload).await?;

    Ok((StatusCode::CREATED, Json(NotificationResponse::from(notification))))
}

/// List the caller's pending notifications
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Pending notifications, earliest first", body = Vec<NotificationResponse>),
        (status = 401, description = "Invalid token")
    ),
    tag = "notifications",
    security((), ("bearer_auth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<NotificationResponse>>> {
    let notifications = state.notification_service.list_pending(owner_id).await?;

    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

/// Cancel a scheduled notification
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Invalid token")
    ),
    tag = "notifications",
    security((), ("bearer_auth" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode> {
    state
        .notification_service
        .delete(owner_id, notification_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
