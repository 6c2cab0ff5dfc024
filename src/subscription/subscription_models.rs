use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Browser `PushSubscription` as serialized by `subscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    #[validate(url)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A registered push endpoint and its delivery health.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PushSubscription {
    pub id: i64,
    pub owner_id: Option<Uuid>,
    pub endpoint: String,
    pub subscription_json: Json<SubscriptionInfo>,
    pub created_at: DateTime<Utc>,
    pub last_successful_push: Option<DateTime<Utc>>,
    pub failed_attempts: i32,
}

impl PushSubscription {
    pub fn info(&self) -> &SubscriptionInfo {
        &self.subscription_json.0
    }
}
