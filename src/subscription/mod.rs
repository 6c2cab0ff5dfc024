pub mod subscription_dto;
pub mod subscription_handlers;
pub mod subscription_models;
pub mod subscription_repository;
pub mod subscription_service;

pub use subscription_dto::{SaveSubscriptionResponse, TestPushRequest};
pub use subscription_handlers::{save_subscription, send_test_push};
pub use subscription_models::{PushSubscription, SubscriptionInfo, SubscriptionKeys};
pub use subscription_repository::{EndpointRegistry, SubscriptionRepository};
pub use subscription_service::SubscriptionService;
