mod auth;
mod db;
mod dispatch;
mod error;
mod middleware;
mod notification;
mod push;
mod routes;
mod scheduler;
mod state;
mod subscription;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use db::{create_pool, run_migrations};
use dispatch::Dispatcher;
use notification::{NotificationRepository, NotificationService};
use push::{RelayTransport, VapidSigner};
use routes::create_router;
use scheduler::{start_reconciliation_service, Reconciler, RunnerConfig, Scheduler, TriggerRepository, TriggerRunner};
use state::{AppState, Config};
use subscription::{SubscriptionRepository, SubscriptionService};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,push_scheduler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Push transport with VAPID credentials bound in
    let signer = VapidSigner::new(
        &config.vapid_private_key,
        config.vapid_public_key.clone(),
        &config.vapid_admin_email,
    )
    .context("Invalid VAPID credentials")?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.delivery_timeout_secs))
        .build()?;
    let transport = Arc::new(RelayTransport::new(
        http,
        config.push_relay_url.clone(),
        signer,
        config.push_ttl_secs,
    ));

    // Create repositories
    let notifications = Arc::new(NotificationRepository::new(db.clone()));
    let endpoints = Arc::new(SubscriptionRepository::new(db.clone()));
    let triggers = Arc::new(TriggerRepository::new(db.clone()));

    // Wire the delivery core
    let scheduler = Scheduler::new(triggers);
    let dispatcher = Arc::new(Dispatcher::new(
        notifications.clone(),
        endpoints.clone(),
        transport.clone(),
        scheduler.clone(),
        Duration::from_secs(config.delivery_timeout_secs),
    ));

    // Start trigger runner
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = TriggerRunner::new(
        scheduler.clone(),
        dispatcher.clone(),
        RunnerConfig {
            poll_interval: Duration::from_secs(config.trigger_poll_interval_secs),
            batch_size: config.trigger_batch_size,
            concurrency: config.dispatch_concurrency,
        },
    );
    let runner_handle = tokio::spawn(runner.run(shutdown_rx));

    // Catch up on anything that came due while the process was down
    let reconciler = Reconciler::new(
        notifications.clone(),
        dispatcher.clone(),
        config.dispatch_concurrency,
    );
    match reconciler.sweep().await {
        Ok(report) => tracing::info!(
            found = report.found,
            dispatched = report.dispatched,
            "Startup reconciliation finished"
        ),
        Err(e) => tracing::error!("Startup reconciliation failed: {:?}", e),
    }
    let mut cron = start_reconciliation_service(reconciler, &config.reconcile_schedule).await?;

    // Create application state
    let state = AppState {
        config: config.clone(),
        notification_service: NotificationService::new(notifications, scheduler),
        subscription_service: SubscriptionService::new(endpoints, transport),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down background services...");
    if let Err(e) = cron.shutdown().await {
        tracing::warn!("Failed to stop reconciliation service: {:?}", e);
    }
    let _ = shutdown_tx.send(true);
    runner_handle.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
