use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Row};
use uuid::Uuid;

use super::subscription_models::{PushSubscription, SubscriptionInfo};
use crate::error::Result;

/// Push endpoints per owner, deduplicated by endpoint URL.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Insert or refresh the subscription for `(owner_id, info.endpoint)`.
    /// The flag is `true` when a new row was created.
    async fn upsert(
        &self,
        owner_id: Option<Uuid>,
        info: SubscriptionInfo,
    ) -> Result<(PushSubscription, bool)>;

    async fn find_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<PushSubscription>>;

    /// Resets `failed_attempts` and stamps `last_successful_push`.
    async fn record_success(&self, id: i64, at: DateTime<Utc>) -> Result<u64>;

    async fn record_failure(&self, id: i64) -> Result<u64>;

    async fn remove(&self, id: i64) -> Result<u64>;
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EndpointRegistry for SubscriptionRepository {
    async fn upsert(
        &self,
        owner_id: Option<Uuid>,
        info: SubscriptionInfo,
    ) -> Result<(PushSubscription, bool)> {
        // xmax is zero only for a freshly inserted tuple.
        let row = sqlx::query(
            "INSERT INTO push_subscriptions (owner_id, endpoint, subscription_json)
             VALUES ($1, $2, $3)
             ON CONFLICT ((COALESCE(owner_id, '00000000-0000-0000-0000-000000000000'::uuid)), endpoint)
             DO UPDATE SET subscription_json = EXCLUDED.subscription_json
             RETURNING *, (xmax = 0) AS created",
        )
        .bind(owner_id)
        .bind(&info.endpoint)
        .bind(Json(&info))
        .fetch_one(&self.pool)
        .await?;

        let created: bool = row.try_get("created")?;
        let subscription = PushSubscription::from_row(&row)?;

        Ok((subscription, created))
    }

    async fn find_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<PushSubscription>> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT id, owner_id, endpoint, subscription_json, created_at,
                    last_successful_push, failed_attempts
             FROM push_subscriptions
             WHERE owner_id IS NOT DISTINCT FROM $1
             ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn record_success(&self, id: i64, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE push_subscriptions
             SET failed_attempts = 0, last_successful_push = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn record_failure(&self, id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET failed_attempts = failed_attempts + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
