use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::subscription::SubscriptionInfo;

/// Why a single delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push service reports the endpoint no longer exists.
    #[error("endpoint gone (status {status})")]
    Gone { status: u16 },

    /// Any other failure; the endpoint is kept.
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

/// Delivers an already-serialized payload to one push endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &SubscriptionInfo,
        payload: &[u8],
    ) -> Result<(), DeliveryError>;
}

/// JSON body handed to the service worker's `push` event.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: PayloadData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PayloadData {
    Notification {
        #[serde(rename = "notificationId")]
        notification_id: i64,
    },
    Confirmation {
        #[serde(rename = "dateOfNotification")]
        date_of_notification: i64,
        url: String,
    },
}

impl PushPayload {
    pub fn notification(id: i64, title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            data: PayloadData::Notification {
                notification_id: id,
            },
        }
    }

    pub fn confirmation(sent_at_millis: i64) -> Self {
        Self {
            title: "Subscription Confirmed".to_string(),
            body: "You will now receive background notifications!".to_string(),
            data: PayloadData::Confirmation {
                date_of_notification: sent_at_millis,
                url: "/".to_string(),
            },
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Plain strings and integers only; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
