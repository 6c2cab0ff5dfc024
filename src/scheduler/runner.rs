//! Worker loop that turns due triggers into dispatches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::time;
use tracing::{debug, error, info};

use super::scheduler_service::Scheduler;
use crate::dispatch::Dispatcher;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on the sleep between queue polls. Other processes sharing
    /// the queue are only noticed at this granularity.
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Dispatches allowed in flight at once.
    pub concurrency: usize,
}

pub struct TriggerRunner {
    scheduler: Scheduler,
    dispatcher: Arc<Dispatcher>,
    config: RunnerConfig,
}

impl TriggerRunner {
    /// Batch size and concurrency are raised to at least 1.
    pub fn new(scheduler: Scheduler, dispatcher: Arc<Dispatcher>, config: RunnerConfig) -> Self {
        let config = RunnerConfig {
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            ..config
        };

        Self {
            scheduler,
            dispatcher,
            config,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped, then
    /// waits up to 30 seconds for in-flight dispatches.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Trigger runner started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        loop {
            let wait = match self.poll(&semaphore).await {
                Ok(wait) => wait,
                Err(e) => {
                    error!("Failed to poll due triggers: {:?}", e);
                    self.config.poll_interval
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Trigger runner received shutdown signal");
                        break;
                    }
                }
                _ = self.scheduler.woken() => {}
                _ = time::sleep(wait) => {}
            }
        }

        info!("Trigger runner waiting for in-flight dispatches...");
        let permits = self.config.concurrency as u32;
        let _ = time::timeout(Duration::from_secs(30), semaphore.acquire_many(permits)).await;
        info!("Trigger runner stopped");
    }

    /// Claims and dispatches one batch of due triggers, returning how long to
    /// sleep before the next poll.
    async fn poll(&self, semaphore: &Arc<Semaphore>) -> Result<Duration> {
        let due = self
            .scheduler
            .claim_due(Utc::now(), self.config.batch_size)
            .await?;
        let claimed = due.len();

        for trigger in due {
            let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
                break;
            };
            let dispatcher = Arc::clone(&self.dispatcher);

            tokio::spawn(async move {
                let _permit = permit;
                match dispatcher.dispatch(trigger.notification_id).await {
                    Ok(outcome) => debug!(
                        trigger_id = trigger.id,
                        notification_id = trigger.notification_id,
                        ?outcome,
                        "Trigger fired"
                    ),
                    // The trigger is consumed; reconciliation retries the notification.
                    Err(e) => error!(
                        trigger_id = trigger.id,
                        notification_id = trigger.notification_id,
                        "Dispatch failed: {:?}", e
                    ),
                }
            });
        }

        if claimed as i64 >= self.config.batch_size {
            return Ok(Duration::ZERO);
        }

        let wait = match self.scheduler.next_fire_at().await? {
            Some(next) => (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.config.poll_interval),
            None => self.config.poll_interval,
        };

        Ok(wait)
    }
}
