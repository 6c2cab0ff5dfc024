use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::notification_models::{ClaimOutcome, NewNotification, Notification};
use crate::error::Result;

/// Durable storage for scheduled notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// Compare-and-set `sent` from false to true. When the claim succeeds and
    /// `next_at` is given, the next occurrence is inserted in the same
    /// transaction.
    async fn claim(&self, id: i64, next_at: Option<DateTime<Utc>>) -> Result<ClaimOutcome>;

    /// Pending notifications in one owner bucket; `None` is the anonymous bucket.
    async fn find_pending_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<Notification>>;

    /// Unsent notifications whose scheduled time is at or before `now`.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>>;

    async fn delete(&self, id: i64, owner_id: Option<Uuid>) -> Result<u64>;
}

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_with_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new: &NewNotification,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO push_notifications (owner_id, title, body, scheduled_time, repeat)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(new.owner_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.scheduled_time)
        .bind(new.repeat.as_str())
        .fetch_one(&mut **tx)
        .await?;

        Ok(notification)
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let mut tx = self.pool.begin().await?;
        let notification = self.insert_with_tx(&mut tx, &new).await?;
        tx.commit().await?;

        Ok(notification)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM push_notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    async fn claim(&self, id: i64, next_at: Option<DateTime<Utc>>) -> Result<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_as::<_, Notification>(
            "UPDATE push_notifications SET sent = true
             WHERE id = $1 AND sent = false
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(notification) = claimed else {
            tx.rollback().await?;

            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM push_notifications WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;

            return Ok(if exists {
                ClaimOutcome::AlreadySent
            } else {
                ClaimOutcome::NotFound
            });
        };

        let next = match next_at {
            Some(at) => {
                let new = NewNotification::next_of(&notification, at);
                Some(self.insert_with_tx(&mut tx, &new).await?)
            }
            None => None,
        };

        tx.commit().await?;

        Ok(ClaimOutcome::Claimed { notification, next })
    }

    async fn find_pending_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM push_notifications
             WHERE owner_id IS NOT DISTINCT FROM $1 AND sent = false
             ORDER BY scheduled_time ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM push_notifications
             WHERE scheduled_time <= $1 AND sent = false
             ORDER BY scheduled_time ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn delete(&self, id: i64, owner_id: Option<Uuid>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM push_notifications WHERE id = $1 AND owner_id IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
