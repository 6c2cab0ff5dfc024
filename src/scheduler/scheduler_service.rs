use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::debug;

use super::trigger_repository::{Trigger, TriggerQueue};
use crate::error::Result;

/// Registers one-shot dispatches of notifications.
///
/// Triggers are persisted before `schedule` returns, so they survive a
/// restart. No deduplication happens here; repeated calls for one id queue
/// repeated triggers and the dispatcher's sent guard absorbs them.
#[derive(Clone)]
pub struct Scheduler {
    triggers: Arc<dyn TriggerQueue>,
    wake: Arc<Notify>,
}

impl Scheduler {
    pub fn new(triggers: Arc<dyn TriggerQueue>) -> Self {
        Self {
            triggers,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Queue a dispatch of `notification_id` at `fire_at`. A time in the past
    /// fires on the runner's next pass.
    pub async fn schedule(&self, notification_id: i64, fire_at: DateTime<Utc>) -> Result<Trigger> {
        let trigger = self.triggers.push(notification_id, fire_at).await?;
        self.wake.notify_one();

        debug!(
            trigger_id = trigger.id,
            notification_id,
            fire_at = %fire_at,
            "Scheduled notification"
        );
        Ok(trigger)
    }

    pub(crate) async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Trigger>> {
        self.triggers.claim_due(now, limit).await
    }

    pub(crate) async fn next_fire_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.triggers.next_fire_at().await
    }

    /// Resolves after the next `schedule` call in this process.
    pub(crate) async fn woken(&self) {
        self.wake.notified().await
    }
}
