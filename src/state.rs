use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;

use crate::notification::NotificationService;
use crate::subscription::SubscriptionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notification_service: NotificationService,
    pub subscription_service: SubscriptionService,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub vapid_private_key: String,
    pub vapid_public_key: String,
    pub vapid_admin_email: String,
    pub push_relay_url: String,
    pub push_ttl_secs: u32,
    pub reconcile_schedule: String,
    pub trigger_poll_interval_secs: u64,
    pub trigger_batch_size: i64,
    pub dispatch_concurrency: usize,
    pub delivery_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{} must be set", key));

        fn parsed<T: FromStr>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T> {
            match value {
                None => Ok(default),
                Some(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", key, raw)),
            }
        }

        fn positive<T: PartialOrd + From<u8>>(value: T, key: &str) -> anyhow::Result<T> {
            if value < T::from(1) {
                anyhow::bail!("{} must be at least 1", key);
            }
            Ok(value)
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed(
                lookup("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                5,
            )?,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(lookup("PORT"), "PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            // .env files cannot hold multi-line values; accept escaped newlines.
            vapid_private_key: required("VAPID_PRIVATE_KEY")?.replace("\\n", "\n"),
            vapid_public_key: required("VAPID_PUBLIC_KEY")?,
            vapid_admin_email: required("VAPID_ADMIN_EMAIL")?,
            push_relay_url: required("PUSH_RELAY_URL")?,
            push_ttl_secs: parsed(lookup("PUSH_TTL_SECS"), "PUSH_TTL_SECS", 86_400)?,
            reconcile_schedule: lookup("RECONCILE_SCHEDULE")
                .unwrap_or_else(|| "0 * * * * *".to_string()),
            trigger_poll_interval_secs: parsed(
                lookup("TRIGGER_POLL_INTERVAL_SECS"),
                "TRIGGER_POLL_INTERVAL_SECS",
                30,
            )?,
            trigger_batch_size: positive(
                parsed(lookup("TRIGGER_BATCH_SIZE"), "TRIGGER_BATCH_SIZE", 100i64)?,
                "TRIGGER_BATCH_SIZE",
            )?,
            dispatch_concurrency: positive(
                parsed(lookup("DISPATCH_CONCURRENCY"), "DISPATCH_CONCURRENCY", 16usize)?,
                "DISPATCH_CONCURRENCY",
            )?,
            delivery_timeout_secs: parsed(
                lookup("DELIVERY_TIMEOUT_SECS"),
                "DELIVERY_TIMEOUT_SECS",
                30,
            )?,
        })
    }
}
