use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::subscription_models::{PushSubscription, SubscriptionInfo};
use super::subscription_repository::EndpointRegistry;
use crate::error::Result;
use crate::push::{PushPayload, PushTransport};

pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_millis(2000);
pub const MAX_CONFIRMATION_DELAY: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct SubscriptionService {
    registry: Arc<dyn EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
}

impl SubscriptionService {
    pub fn new(registry: Arc<dyn EndpointRegistry>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Registers `info` for the owner; re-subscribing the same endpoint
    /// refreshes its keys instead of adding a row.
    pub async fn save(
        &self,
        owner_id: Option<Uuid>,
        info: SubscriptionInfo,
    ) -> Result<(PushSubscription, bool)> {
        let (subscription, created) = self.registry.upsert(owner_id, info).await?;

        info!(
            subscription_id = subscription.id,
            created,
            "Subscription saved"
        );
        Ok((subscription, created))
    }

    /// Sends a one-off confirmation push after `delay` in the background.
    pub fn send_confirmation(&self, info: SubscriptionInfo, delay: Option<Duration>) -> JoinHandle<()> {
        let delay = delay
            .unwrap_or(DEFAULT_CONFIRMATION_DELAY)
            .min(MAX_CONFIRMATION_DELAY);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let payload = PushPayload::confirmation(Utc::now().timestamp_millis()).to_bytes();
            match transport.send(&info, &payload).await {
                Ok(()) => info!(endpoint = %info.endpoint, "Confirmation push sent"),
                Err(e) => warn!(endpoint = %info.endpoint, "Confirmation push failed: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{subscription_info, MemoryEndpointRegistry, ScriptedTransport};

    const PHONE: &str = "https://fcm.googleapis.com/fcm/send/phone";

    fn service() -> (SubscriptionService, Arc<MemoryEndpointRegistry>, Arc<ScriptedTransport>) {
        let registry = Arc::new(MemoryEndpointRegistry::default());
        let transport = Arc::new(ScriptedTransport::new());
        (
            SubscriptionService::new(registry.clone(), transport.clone()),
            registry,
            transport,
        )
    }

    #[tokio::test]
    async fn test_save_same_endpoint_twice_keeps_one_row() {
        let (svc, registry, _) = service();
        let owner = Some(Uuid::new_v4());

        let (first, created) = svc.save(owner, subscription_info(PHONE)).await.unwrap();
        assert!(created);

        let mut refreshed = subscription_info(PHONE);
        refreshed.keys.auth = "rotated".into();
        let (second, created) = svc.save(owner, refreshed).await.unwrap();

        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.get(first.id).unwrap().info().keys.auth, "rotated");
    }

    #[tokio::test]
    async fn test_same_endpoint_different_owners_are_separate() {
        let (svc, registry, _) = service();

        svc.save(Some(Uuid::new_v4()), subscription_info(PHONE)).await.unwrap();
        svc.save(None, subscription_info(PHONE)).await.unwrap();

        assert_eq!(registry.all().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_delay_is_capped() {
        let (svc, _, transport) = service();
        let started = tokio::time::Instant::now();

        svc.send_confirmation(subscription_info(PHONE), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= MAX_CONFIRMATION_DELAY);
        assert!(elapsed < Duration::from_secs(6));
        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].payload["title"], "Subscription Confirmed");
        assert_eq!(attempts[0].payload["data"]["url"], "/");
        assert!(attempts[0].payload["data"]["dateOfNotification"].is_i64());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_default_delay() {
        let (svc, _, transport) = service();
        let started = tokio::time::Instant::now();

        svc.send_confirmation(subscription_info(PHONE), None).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_CONFIRMATION_DELAY);
        assert!(elapsed < MAX_CONFIRMATION_DELAY);
        assert_eq!(transport.attempts_to(PHONE), 1);
    }
}
