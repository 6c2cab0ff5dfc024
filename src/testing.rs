//! In-memory stores, a scripted transport and a wiring harness for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::notification::notification_models::{NewNotification, Notification, Repeat};
use crate::notification::{ClaimOutcome, NotificationStore};
use crate::push::{DeliveryError, PushTransport};
use crate::scheduler::trigger_repository::{Trigger, TriggerQueue};
use crate::scheduler::Scheduler;
use crate::state::Config;
use crate::subscription::{
    EndpointRegistry, PushSubscription, SubscriptionInfo, SubscriptionKeys,
};

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/push_scheduler_test".into(),
        database_max_connections: 1,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: TEST_JWT_SECRET.into(),
        vapid_private_key: String::new(),
        vapid_public_key: String::new(),
        vapid_admin_email: "ops@example.com".into(),
        push_relay_url: "http://127.0.0.1:9/push".into(),
        push_ttl_secs: 60,
        reconcile_schedule: "0 * * * * *".into(),
        trigger_poll_interval_secs: 1,
        trigger_batch_size: 10,
        dispatch_concurrency: 4,
        delivery_timeout_secs: 1,
    }
}

pub fn subscription_info(endpoint: &str) -> SubscriptionInfo {
    SubscriptionInfo {
        endpoint: endpoint.to_string(),
        expiration_time: None,
        keys: SubscriptionKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".into(),
            auth: "tBHItJI5svbpez7KI4CCXg".into(),
        },
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct Rows<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Rows<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Rows<T> {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: Mutex<Rows<Notification>>,
}

impl MemoryNotificationStore {
    pub fn get(&self, id: i64) -> Option<Notification> {
        self.inner.lock().unwrap().rows.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().rows.values().cloned().collect()
    }

    fn insert(rows: &mut Rows<Notification>, new: NewNotification) -> Notification {
        let notification = Notification {
            id: rows.next_id(),
            owner_id: new.owner_id,
            title: new.title,
            body: new.body,
            scheduled_time: new.scheduled_time,
            repeat: new.repeat,
            sent: false,
            created_at: Utc::now(),
        };
        rows.rows.insert(notification.id, notification.clone());
        notification
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let mut rows = self.inner.lock().unwrap();
        Ok(Self::insert(&mut rows, new))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.get(id))
    }

    async fn claim(&self, id: i64, next_at: Option<DateTime<Utc>>) -> Result<ClaimOutcome> {
        let mut rows = self.inner.lock().unwrap();

        let notification = match rows.rows.get_mut(&id) {
            None => return Ok(ClaimOutcome::NotFound),
            Some(row) if row.sent => return Ok(ClaimOutcome::AlreadySent),
            Some(row) => {
                row.sent = true;
                row.clone()
            }
        };

        let next = next_at.map(|at| Self::insert(&mut rows, NewNotification::next_of(&notification, at)));

        Ok(ClaimOutcome::Claimed { notification, next })
    }

    async fn find_pending_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<Notification>> {
        let mut pending: Vec<_> = self
            .all()
            .into_iter()
            .filter(|n| n.owner_id == owner_id && !n.sent)
            .collect();
        pending.sort_by_key(|n| n.scheduled_time);
        Ok(pending)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let mut due: Vec<_> = self
            .all()
            .into_iter()
            .filter(|n| n.scheduled_time <= now && !n.sent)
            .collect();
        due.sort_by_key(|n| n.scheduled_time);
        Ok(due)
    }

    async fn delete(&self, id: i64, owner_id: Option<Uuid>) -> Result<u64> {
        let mut rows = self.inner.lock().unwrap();
        match rows.rows.get(&id) {
            Some(n) if n.owner_id == owner_id => {
                rows.rows.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[derive(Default)]
pub struct MemoryEndpointRegistry {
    inner: Mutex<Rows<PushSubscription>>,
}

impl MemoryEndpointRegistry {
    pub fn get(&self, id: i64) -> Option<PushSubscription> {
        self.inner.lock().unwrap().rows.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<PushSubscription> {
        self.inner.lock().unwrap().rows.values().cloned().collect()
    }
}

#[async_trait]
impl EndpointRegistry for MemoryEndpointRegistry {
    async fn upsert(
        &self,
        owner_id: Option<Uuid>,
        info: SubscriptionInfo,
    ) -> Result<(PushSubscription, bool)> {
        let mut rows = self.inner.lock().unwrap();

        if let Some(existing) = rows
            .rows
            .values_mut()
            .find(|s| s.owner_id == owner_id && s.endpoint == info.endpoint)
        {
            existing.subscription_json = Json(info);
            return Ok((existing.clone(), false));
        }

        let subscription = PushSubscription {
            id: rows.next_id(),
            owner_id,
            endpoint: info.endpoint.clone(),
            subscription_json: Json(info),
            created_at: Utc::now(),
            last_successful_push: None,
            failed_attempts: 0,
        };
        rows.rows.insert(subscription.id, subscription.clone());
        Ok((subscription, true))
    }

    async fn find_by_owner(&self, owner_id: Option<Uuid>) -> Result<Vec<PushSubscription>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|s| s.owner_id == owner_id)
            .collect())
    }

    async fn record_success(&self, id: i64, at: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.inner.lock().unwrap();
        Ok(match rows.rows.get_mut(&id) {
            Some(s) => {
                s.failed_attempts = 0;
                s.last_successful_push = Some(at);
                1
            }
            None => 0,
        })
    }

    async fn record_failure(&self, id: i64) -> Result<u64> {
        let mut rows = self.inner.lock().unwrap();
        Ok(match rows.rows.get_mut(&id) {
            Some(s) => {
                s.failed_attempts += 1;
                1
            }
            None => 0,
        })
    }

    async fn remove(&self, id: i64) -> Result<u64> {
        let mut rows = self.inner.lock().unwrap();
        Ok(rows.rows.remove(&id).map_or(0, |_| 1))
    }
}

#[derive(Default)]
pub struct MemoryTriggerQueue {
    inner: Mutex<Rows<Trigger>>,
}

impl MemoryTriggerQueue {
    pub fn queued(&self) -> Vec<Trigger> {
        self.inner.lock().unwrap().rows.values().cloned().collect()
    }
}

#[async_trait]
impl TriggerQueue for MemoryTriggerQueue {
    async fn push(&self, notification_id: i64, fire_at: DateTime<Utc>) -> Result<Trigger> {
        let mut rows = self.inner.lock().unwrap();
        let trigger = Trigger {
            id: rows.next_id(),
            notification_id,
            fire_at,
        };
        rows.rows.insert(trigger.id, trigger.clone());
        Ok(trigger)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Trigger>> {
        let mut rows = self.inner.lock().unwrap();
        let mut due: Vec<_> = rows
            .rows
            .values()
            .filter(|t| t.fire_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|t| t.fire_at);
        due.truncate(limit.max(0) as usize);
        for trigger in &due {
            rows.rows.remove(&trigger.id);
        }
        Ok(due)
    }

    async fn next_fire_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.queued().into_iter().map(|t| t.fire_at).min())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Deliver,
    Gone,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub endpoint: String,
    pub payload: serde_json::Value,
}

/// Transport whose outcome per endpoint URL is fixed up front. Endpoints
/// without a script are delivered.
#[derive(Default)]
pub struct ScriptedTransport {
    script: HashMap<String, Behavior>,
    attempts: Mutex<Vec<Attempt>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, endpoint: &str, behavior: Behavior) -> Self {
        self.script.insert(endpoint.to_string(), behavior);
        self
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_to(&self, endpoint: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(
        &self,
        subscription: &SubscriptionInfo,
        payload: &[u8],
    ) -> std::result::Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(Attempt {
            endpoint: subscription.endpoint.clone(),
            payload: serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null),
        });

        match self
            .script
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(Behavior::Deliver)
        {
            Behavior::Deliver => Ok(()),
            Behavior::Gone => Err(DeliveryError::Gone { status: 410 }),
            Behavior::Fail => Err(DeliveryError::Transient("push relay returned 503".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

/// Dispatcher and scheduler wired to in-memory collaborators.
pub struct Harness {
    pub notifications: Arc<MemoryNotificationStore>,
    pub endpoints: Arc<MemoryEndpointRegistry>,
    pub triggers: Arc<MemoryTriggerQueue>,
    pub transport: Arc<ScriptedTransport>,
    pub scheduler: Scheduler,
    pub dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self::with_delivery_timeout(transport, Duration::from_secs(5))
    }

    pub fn with_delivery_timeout(transport: ScriptedTransport, timeout: Duration) -> Self {
        let notifications = Arc::new(MemoryNotificationStore::default());
        let endpoints = Arc::new(MemoryEndpointRegistry::default());
        let triggers = Arc::new(MemoryTriggerQueue::default());
        let transport = Arc::new(transport);
        let scheduler = Scheduler::new(triggers.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            notifications.clone(),
            endpoints.clone(),
            transport.clone(),
            scheduler.clone(),
            timeout,
        ));

        Self {
            notifications,
            endpoints,
            triggers,
            transport,
            scheduler,
            dispatcher,
        }
    }

    pub async fn subscribe(&self, owner_id: Option<Uuid>, endpoint: &str) -> PushSubscription {
        let (subscription, _) = self
            .endpoints
            .upsert(owner_id, subscription_info(endpoint))
            .await
            .unwrap();
        subscription
    }

    pub async fn notify(
        &self,
        owner_id: Option<Uuid>,
        repeat: Repeat,
        scheduled_time: DateTime<Utc>,
    ) -> Notification {
        self.notifications
            .create(NewNotification {
                owner_id,
                title: "Test".into(),
                body: "x".into(),
                scheduled_time,
                repeat,
            })
            .await
            .unwrap()
    }
}
