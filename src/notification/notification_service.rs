use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use super::notification_dto::CreateNotificationRequest;
use super::notification_models::{NewNotification, Notification, Repeat};
use super::notification_repository::NotificationStore;
use crate::error::{AppError, Result};
use crate::scheduler::Scheduler;

/// Creation, listing and cancellation of scheduled notifications.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    scheduler: Scheduler,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, scheduler: Scheduler) -> Self {
        Self { store, scheduler }
    }

    /// Persists the notification and queues its first trigger.
    ///
    /// A queuing failure is logged but not returned: the row is committed and
    /// the reconciliation sweep delivers it once it is due.
    pub async fn create(
        &self,
        owner_id: Option<Uuid>,
        payload: CreateNotificationRequest,
    ) -> Result<Notification> {
        let repeat = match payload.repeat.as_deref() {
            None => Repeat::None,
            Some(raw) => raw.parse::<Repeat>().map_err(AppError::Validation)?,
        };

        let scheduled_time = DateTime::<Utc>::from_timestamp_millis(payload.scheduled_time)
            .ok_or_else(|| AppError::Validation("scheduledTime is out of range".into()))?;

        let notification = self
            .store
            .create(NewNotification {
                owner_id,
                title: payload.title,
                body: payload.body,
                scheduled_time,
                repeat,
            })
            .await?;

        if let Err(e) = self
            .scheduler
            .schedule(notification.id, notification.scheduled_time)
            .await
        {
            error!(
                notification_id = notification.id,
                "Failed to queue notification trigger: {:?}", e
            );
        }

        info!(
            notification_id = notification.id,
            repeat = %notification.repeat,
            scheduled_time = %notification.scheduled_time,
            "Notification created"
        );
        Ok(notification)
    }

    pub async fn list_pending(&self, owner_id: Option<Uuid>) -> Result<Vec<Notification>> {
        self.store.find_pending_by_owner(owner_id).await
    }

    /// Any trigger still queued for the notification becomes a no-op.
    pub async fn delete(&self, owner_id: Option<Uuid>, id: i64) -> Result<()> {
        let rows_affected = self.store.delete(id, owner_id).await?;

        if rows_affected == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }

        Ok(())
    }
}
