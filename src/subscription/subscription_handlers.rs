use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::subscription_dto::{SaveSubscriptionResponse, TestPushRequest};
use super::subscription_models::SubscriptionInfo;
use crate::{error::Result, middleware::Owner, state::AppState};

/// Register a browser push subscription
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    request_body = SubscriptionInfo,
    responses(
        (status = 200, description = "Subscription saved", body = SaveSubscriptionResponse),
        (status = 400, description = "Invalid subscription"),
        (status = 401, description = "Invalid token")
    ),
    tag = "subscriptions",
    security((), ("bearer_auth" = []))
)]
pub async fn save_subscription(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Json(payload): Json<SubscriptionInfo>,
) -> Result<Json<SaveSubscriptionResponse>> {
    payload.validate()?;

    let (subscription, created) = state.subscription_service.save(owner_id, payload).await?;

    Ok(Json(SaveSubscriptionResponse {
        success: true,
        id: subscription.id,
        created,
    }))
}

/// Send a confirmation push to a subscription
#[utoipa::path(
    post,
    path = "/api/subscriptions/test",
    request_body = TestPushRequest,
    responses(
        (status = 202, description = "Confirmation push queued"),
        (status = 400, description = "Invalid subscription")
    ),
    tag = "subscriptions"
)]
pub async fn send_test_push(
    State(state): State<AppState>,
    Json(payload): Json<TestPushRequest>,
) -> Result<StatusCode> {
    payload.validate()?;

    state
        .subscription_service
        .send_confirmation(payload.subscription, payload.delay.map(Duration::from_millis));

    Ok(StatusCode::ACCEPTED)
}
