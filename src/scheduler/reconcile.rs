use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::Result;
use crate::notification::NotificationStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub found: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Safety net that re-dispatches overdue notifications never marked sent,
/// e.g. when a runner died between claiming a trigger and committing the
/// sent flag.
#[derive(Clone)]
pub struct Reconciler {
    notifications: Arc<dyn NotificationStore>,
    dispatcher: Arc<Dispatcher>,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        dispatcher: Arc<Dispatcher>,
        concurrency: usize,
    ) -> Self {
        Self {
            notifications,
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let due = self.notifications.find_due(Utc::now()).await?;
        let mut report = SweepReport {
            found: due.len(),
            ..Default::default()
        };

        let outcomes: Vec<_> = stream::iter(due.into_iter().map(|n| n.id))
            .map(|id| {
                let dispatcher = Arc::clone(&self.dispatcher);
                async move { (id, dispatcher.dispatch(id).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(DispatchOutcome::Dispatched(_)) => report.dispatched += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    warn!(notification_id = id, "Reconciliation dispatch failed: {:?}", e);
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Runs `reconciler` on the cron `schedule` (seconds field first).
pub async fn start_reconciliation_service(
    reconciler: Reconciler,
    schedule: &str,
) -> std::result::Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let reconciler = reconciler.clone();

        Box::pin(async move {
            match reconciler.sweep().await {
                Ok(report) if report.found > 0 => info!(
                    found = report.found,
                    dispatched = report.dispatched,
                    skipped = report.skipped,
                    errors = report.errors,
                    "Checked for pending notifications"
                ),
                Ok(_) => {}
                Err(e) => error!("Error checking pending notifications: {:?}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Reconciliation service started ({})", schedule);
    Ok(scheduler)
}
