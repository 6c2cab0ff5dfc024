pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;
pub mod notification_service;
pub mod recurrence;

pub use notification_dto::{CreateNotificationRequest, NotificationResponse};
pub use notification_handlers::{create_notification, delete_notification, get_notifications};
pub use notification_models::ClaimOutcome;
pub use notification_repository::{NotificationRepository, NotificationStore};
pub use notification_service::NotificationService;
pub use recurrence::next_occurrence;
