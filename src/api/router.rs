//! Router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, connect_wallet_handler, disconnect_wallet_handler, dismiss_notification_handler,
    fee_handler, get_session_handler, health_check_handler, liveness_handler, navigate_handler,
    readiness_handler, refresh_handler, submit_command_handler,
};

/// Timeout for everything except `/commands`
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Build the application router.
///
/// `/commands` waits for on-chain confirmation, which can legitimately take
/// until the confirmation deadline, so it sits outside the request timeout.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let timed_routes = Router::new()
        .route("/session", get(get_session_handler))
        .route("/wallet/connect", post(connect_wallet_handler))
        .route("/wallet/disconnect", post(disconnect_wallet_handler))
        .route("/refresh", post(refresh_handler))
        .route("/view", post(navigate_handler))
        .route("/notification", delete(dismiss_notification_handler))
        .route("/fee", get(fee_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ));

    let command_routes = Router::new().route("/commands", post(submit_command_handler));

    Router::new()
        .merge(timed_routes)
        .merge(command_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(app_state)
}
