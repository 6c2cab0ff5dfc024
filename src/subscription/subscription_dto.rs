use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::subscription_models::SubscriptionInfo;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaveSubscriptionResponse {
    pub success: bool,
    pub id: i64,
    /// `false` when an existing subscription for the endpoint was refreshed.
    pub created: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TestPushRequest {
    #[validate(nested)]
    pub subscription: SubscriptionInfo,
    /// Milliseconds to wait before sending; capped at 5000.
    pub delay: Option<u64>,
}
