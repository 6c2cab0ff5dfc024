use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::Result;

/// A durable request to dispatch a notification at `fire_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trigger {
    pub id: i64,
    pub notification_id: i64,
    pub fire_at: DateTime<Utc>,
}

/// Delayed-execution queue keyed by (notification id, time).
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    async fn push(&self, notification_id: i64, fire_at: DateTime<Utc>) -> Result<Trigger>;

    /// Remove and return up to `limit` triggers due at `now`, earliest first.
    /// A trigger is handed to exactly one caller.
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Trigger>>;

    /// Earliest `fire_at` still queued.
    async fn next_fire_at(&self) -> Result<Option<DateTime<Utc>>>;
}

#[derive(Clone)]
pub struct TriggerRepository {
    pool: PgPool,
}

impl TriggerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TriggerQueue for TriggerRepository {
    async fn push(&self, notification_id: i64, fire_at: DateTime<Utc>) -> Result<Trigger> {
        let trigger = sqlx::query_as::<_, Trigger>(
            "INSERT INTO push_triggers (notification_id, fire_at)
             VALUES ($1, $2)
             RETURNING id, notification_id, fire_at",
        )
        .bind(notification_id)
        .bind(fire_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(trigger)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Trigger>> {
        let mut triggers = sqlx::query_as::<_, Trigger>(
            "DELETE FROM push_triggers
             WHERE id IN (
                 SELECT id FROM push_triggers
                 WHERE fire_at <= $1
                 ORDER BY fire_at
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, notification_id, fire_at",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING order is unspecified.
        triggers.sort_by_key(|t| t.fire_at);
        Ok(triggers)
    }

    async fn next_fire_at(&self) -> Result<Option<DateTime<Utc>>> {
        let next: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(fire_at) FROM push_triggers")
                .fetch_one(&self.pool)
                .await?;

        Ok(next)
    }
}
