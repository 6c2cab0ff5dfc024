use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::notification_models::{Notification, Repeat};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
    /// Milliseconds since the Unix epoch.
    pub scheduled_time: i64,
    /// `none`, `daily` or `weekly`; absent means `none`.
    pub repeat: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Milliseconds since the Unix epoch.
    pub scheduled_time: i64,
    #[schema(value_type = String, example = "daily")]
    pub repeat: Repeat,
    pub sent: bool,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            title: n.title,
            body: n.body,
            scheduled_time: n.scheduled_time.timestamp_millis(),
            repeat: n.repeat,
            sent: n.sent,
        }
    }
}
