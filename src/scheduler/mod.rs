pub mod reconcile;
pub mod runner;
pub mod scheduler_service;
pub mod trigger_repository;

pub use reconcile::{start_reconciliation_service, Reconciler};
pub use runner::{RunnerConfig, TriggerRunner};
pub use scheduler_service::Scheduler;
pub use trigger_repository::TriggerRepository;
