use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::Serialize;

use super::transport::{DeliveryError, PushTransport};
use super::vapid::VapidSigner;
use crate::subscription::SubscriptionInfo;

/// Hands pushes to a Web Push relay, which performs the RFC 8291 payload
/// encryption and forwards the message to the browser's push service. The
/// relay echoes the push service status code back.
pub struct RelayTransport {
    client: reqwest::Client,
    relay_url: String,
    signer: VapidSigner,
    ttl_secs: u32,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: &'a SubscriptionInfo,
    payload: &'a str,
    ttl: u32,
}

impl RelayTransport {
    pub fn new(client: reqwest::Client, relay_url: String, signer: VapidSigner, ttl_secs: u32) -> Self {
        Self {
            client,
            relay_url,
            signer,
            ttl_secs,
        }
    }
}

#[async_trait]
impl PushTransport for RelayTransport {
    async fn send(
        &self,
        subscription: &SubscriptionInfo,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let authorization = self
            .signer
            .authorization(&subscription.endpoint)
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let payload = std::str::from_utf8(payload)
            .map_err(|e| DeliveryError::Transient(format!("payload is not UTF-8: {}", e)))?;

        let response = self
            .client
            .post(&self.relay_url)
            .header(AUTHORIZATION, authorization)
            .json(&RelayRequest {
                subscription,
                payload,
                ttl: self.ttl_secs,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// 404 and 410 mean the subscription expired or was revoked.
fn classify_failure(status: StatusCode, body: &str) -> DeliveryError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => DeliveryError::Gone {
            status: status.as_u16(),
        },
        _ => DeliveryError::Transient(format!("push relay returned {}: {}", status, body)),
    }
}
