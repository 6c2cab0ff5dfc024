use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::notification::notification_models::Repeat;
use crate::notification::{next_occurrence, ClaimOutcome, NotificationStore};
use crate::push::{DeliveryError, PushPayload, PushTransport};
use crate::scheduler::Scheduler;
use crate::subscription::{EndpointRegistry, PushSubscription};

/// What a single `dispatch` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(DispatchReport),
    /// Someone else already claimed this notification.
    AlreadySent,
    /// Deleted before its trigger fired.
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub notification_id: i64,
    pub delivered: usize,
    pub removed: usize,
    pub failed: usize,
    /// Id of the chained occurrence of a recurring notification.
    pub next_occurrence: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointOutcome {
    Delivered,
    Removed,
    Failed,
}

/// Fans a due notification out to every push endpoint of its owner.
pub struct Dispatcher {
    notifications: Arc<dyn NotificationStore>,
    endpoints: Arc<dyn EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
    scheduler: Scheduler,
    delivery_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        endpoints: Arc<dyn EndpointRegistry>,
        transport: Arc<dyn PushTransport>,
        scheduler: Scheduler,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            notifications,
            endpoints,
            transport,
            scheduler,
            delivery_timeout,
        }
    }

    /// Deliver notification `notification_id` once.
    ///
    /// The sent flag is committed before any delivery is attempted, so a
    /// notification counts as sent even when every endpoint fails. Safe to call
    /// any number of times, concurrently included: only the caller that wins
    /// the claim delivers.
    pub async fn dispatch(&self, notification_id: i64) -> Result<DispatchOutcome> {
        let Some(notification) = self.notifications.find_by_id(notification_id).await? else {
            warn!(notification_id, "Notification not found, nothing to send");
            return Ok(DispatchOutcome::NotFound);
        };

        if notification.sent {
            debug!(notification_id, "Notification already sent");
            return Ok(DispatchOutcome::AlreadySent);
        }

        let next_at = next_occurrence(&notification);
        if next_at.is_none() && notification.repeat != Repeat::None {
            warn!(
                notification_id,
                repeat = %notification.repeat,
                scheduled_time = %notification.scheduled_time,
                "Next occurrence is out of range, recurring series ends here"
            );
        }
        let (notification, next) = match self.notifications.claim(notification_id, next_at).await? {
            ClaimOutcome::Claimed { notification, next } => (notification, next),
            ClaimOutcome::AlreadySent => {
                debug!(notification_id, "Lost the claim to a concurrent dispatch");
                return Ok(DispatchOutcome::AlreadySent);
            }
            ClaimOutcome::NotFound => {
                warn!(notification_id, "Notification deleted before it could be claimed");
                return Ok(DispatchOutcome::NotFound);
            }
        };

        info!(notification_id, title = %notification.title, "Sending notification");

        if let Some(next) = &next {
            // The row is committed; if queuing fails the sweep picks it up once due.
            if let Err(e) = self.scheduler.schedule(next.id, next.scheduled_time).await {
                error!(
                    notification_id = next.id,
                    "Failed to schedule next occurrence: {:?}", e
                );
            }
        }

        let subscriptions = self.endpoints.find_by_owner(notification.owner_id).await?;
        let payload: Arc<[u8]> =
            PushPayload::notification(notification.id, &notification.title, &notification.body)
                .to_bytes()
                .into();

        let mut deliveries = JoinSet::new();
        for subscription in subscriptions {
            deliveries.spawn(deliver(
                Arc::clone(&self.endpoints),
                Arc::clone(&self.transport),
                subscription,
                Arc::clone(&payload),
                self.delivery_timeout,
            ));
        }

        let mut report = DispatchReport {
            notification_id,
            next_occurrence: next.map(|n| n.id),
            ..Default::default()
        };

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(EndpointOutcome::Delivered) => report.delivered += 1,
                Ok(EndpointOutcome::Removed) => report.removed += 1,
                Ok(EndpointOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(notification_id, "Delivery task aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            notification_id,
            delivered = report.delivered,
            removed = report.removed,
            failed = report.failed,
            "Notification dispatched"
        );

        Ok(DispatchOutcome::Dispatched(report))
    }
}

/// One delivery attempt to one endpoint, plus the registry bookkeeping for its
/// outcome. Never fails: every error is logged and folded into the outcome.
async fn deliver(
    endpoints: Arc<dyn EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
    subscription: PushSubscription,
    payload: Arc<[u8]>,
    deadline: Duration,
) -> EndpointOutcome {
    let subscription_id = subscription.id;

    let result = match tokio::time::timeout(deadline, transport.send(subscription.info(), &payload)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Transient(format!(
            "no response within {}s",
            deadline.as_secs_f32()
        ))),
    };

    match result {
        Ok(()) => {
            debug!(subscription_id, "Delivered push");
            if let Err(e) = endpoints.record_success(subscription_id, Utc::now()).await {
                warn!(subscription_id, "Failed to record delivery: {:?}", e);
            }
            EndpointOutcome::Delivered
        }
        Err(DeliveryError::Gone { status }) => {
            info!(subscription_id, status, "Push endpoint is gone, removing subscription");
            match endpoints.remove(subscription_id).await {
                Ok(0) => debug!(subscription_id, "Subscription already removed"),
                Ok(_) => {}
                Err(e) => warn!(subscription_id, "Failed to remove subscription: {:?}", e),
            }
            EndpointOutcome::Removed
        }
        Err(DeliveryError::Transient(reason)) => {
            warn!(subscription_id, %reason, "Push delivery failed");
            if let Err(e) = endpoints.record_failure(subscription_id).await {
                warn!(subscription_id, "Failed to record delivery failure: {:?}", e);
            }
            EndpointOutcome::Failed
        }
    }
}
