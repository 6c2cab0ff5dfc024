use crate::{
    notification::{self, CreateNotificationRequest, NotificationResponse},
    state::AppState,
    subscription::{self, SaveSubscriptionResponse, SubscriptionInfo, SubscriptionKeys, TestPushRequest},
};
use axum::{
    routing::{delete, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification::notification_handlers::create_notification,
        notification::notification_handlers::get_notifications,
        notification::notification_handlers::delete_notification,
        subscription::subscription_handlers::save_subscription,
        subscription::subscription_handlers::send_test_push,
    ),
    components(
        schemas(
            CreateNotificationRequest,
            NotificationResponse,
            SubscriptionInfo,
            SubscriptionKeys,
            SaveSubscriptionResponse,
            TestPushRequest,
        )
    ),
    tags(
        (name = "notifications", description = "Scheduled push notifications"),
        (name = "subscriptions", description = "Browser push subscriptions")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Owner is resolved per handler; a missing token means the anonymous bucket
    let notification_routes = Router::new()
        .route(
            "/",
            post(notification::create_notification).get(notification::get_notifications),
        )
        .route("/:id", delete(notification::delete_notification));

    let subscription_routes = Router::new()
        .route("/", post(subscription::save_subscription))
        .route("/test", post(subscription::send_test_push));

    let api_routes = Router::new()
        .nest("/notifications", notification_routes)
        .nest("/subscriptions", subscription_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
