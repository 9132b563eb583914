//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::app::{AppState, CommandRequest, Session};
use crate::domain::{
    Account, AggregatedBalances, AppError, Amount, BlockchainError, ErrorDetail, ErrorResponse,
    FeeEstimate, HealthResponse, HealthStatus, Navigation, Notification, View, WalletError,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bank Console API",
        version = "0.1.0",
        description = "Session-driven frontend for the on-chain bank contract",
        license(
            name = "MIT"
        )
    ),
    paths(
        get_session_handler,
        connect_wallet_handler,
        disconnect_wallet_handler,
        refresh_handler,
        navigate_handler,
        submit_command_handler,
        dismiss_notification_handler,
        fee_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            Session,
            View,
            Navigation,
            CommandRequest,
            Account,
            AggregatedBalances,
            Amount,
            Notification,
            FeeEstimate,
            FeeResponse,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "session", description = "Session snapshot and navigation"),
        (name = "wallet", description = "Wallet connection"),
        (name = "commands", description = "Bank commands"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Raw transfer form inputs
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeeQuery {
    /// Amount as typed; blank means no estimate
    pub amount: Option<String>,
    /// Destination account name
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeeResponse {
    pub estimate: Option<FeeEstimate>,
    /// Rendered estimate, empty when there is nothing to show
    pub text: String,
}

/// Current session snapshot
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = 200, description = "Current session", body = Session)
    )
)]
pub async fn get_session_handler(State(state): State<Arc<AppState>>) -> Json<Session> {
    Json(state.controller.session())
}

/// Connect the wallet and prefetch its accounts
#[utoipa::path(
    post,
    path = "/wallet/connect",
    tag = "wallet",
    responses(
        (status = 200, description = "Session after connecting", body = Session),
        (status = 502, description = "Wallet bridge rejected or unavailable", body = ErrorResponse)
    )
)]
pub async fn connect_wallet_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Session>, AppError> {
    let session = state.controller.connect_wallet().await?;
    Ok(Json(session))
}

/// Disconnect the wallet
#[utoipa::path(
    post,
    path = "/wallet/disconnect",
    tag = "wallet",
    responses(
        (status = 200, description = "Session after disconnecting", body = Session),
        (status = 502, description = "Wallet bridge rejected or unavailable", body = ErrorResponse)
    )
)]
pub async fn disconnect_wallet_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Session>, AppError> {
    let session = state.controller.disconnect_wallet().await?;
    Ok(Json(session))
}

/// Re-read accounts and balances from the chain
#[utoipa::path(
    post,
    path = "/refresh",
    tag = "session",
    responses(
        (status = 200, description = "Session with fresh balances", body = Session)
    )
)]
pub async fn refresh_handler(State(state): State<Arc<AppState>>) -> Json<Session> {
    Json(state.controller.refresh().await)
}

/// Apply a navigation event to the active view
#[utoipa::path(
    post,
    path = "/view",
    tag = "session",
    request_body = Navigation,
    responses(
        (status = 200, description = "Session on the new view", body = Session),
        (status = 400, description = "Event not allowed from the active view", body = ErrorResponse)
    )
)]
pub async fn navigate_handler(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Navigation>,
) -> Result<Json<Session>, AppError> {
    let session = state.controller.navigate(event)?;
    Ok(Json(session))
}

/// Run a command for the active view
///
/// Blocks until the transaction is confirmed, rejected, or the confirmation
/// deadline passes. A failed command still answers 200: the returned
/// session's `notification` describes what went wrong.
#[utoipa::path(
    post,
    path = "/commands",
    tag = "commands",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Session after the command finished", body = Session),
        (status = 400, description = "Command does not match the active view", body = ErrorResponse),
        (status = 409, description = "Another command is in progress or no wallet is connected", body = ErrorResponse)
    )
)]
pub async fn submit_command_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state.controller.submit(request).await?;
    Ok(Json(session))
}

/// Dismiss the current notification
#[utoipa::path(
    delete,
    path = "/notification",
    tag = "session",
    responses(
        (status = 200, description = "Session without notification", body = Session)
    )
)]
pub async fn dismiss_notification_handler(State(state): State<Arc<AppState>>) -> Json<Session> {
    Json(state.controller.dismiss_notification())
}

/// Advisory transfer fee for the current form inputs
#[utoipa::path(
    get,
    path = "/fee",
    tag = "commands",
    params(FeeQuery),
    responses(
        (status = 200, description = "Fee estimate", body = FeeResponse),
        (status = 400, description = "Amount is not a whole number", body = ErrorResponse)
    )
)]
pub async fn fee_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeeQuery>,
) -> Result<Json<FeeResponse>, AppError> {
    let amount = match query.amount.as_deref() {
        Some(raw) => Amount::parse_input(raw)?,
        None => None,
    };
    let estimate = state.controller.estimate_fee(amount, query.to.as_deref());
    let text = estimate.map(|e| e.to_string()).unwrap_or_default();
    Ok(Json(FeeResponse { estimate, text }))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Blockchain(bc_err) => match bc_err {
                BlockchainError::Connection(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "blockchain_error")
                }
                BlockchainError::ConfirmationTimeout { .. } => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout")
                }
                BlockchainError::Cancelled(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "cancelled")
                }
                _ => (StatusCode::BAD_GATEWAY, "blockchain_error"),
            },
            AppError::Wallet(wallet_err) => match wallet_err {
                WalletError::NotConnected => (StatusCode::CONFLICT, "wallet_not_connected"),
                WalletError::Rejected(_) => (StatusCode::BAD_GATEWAY, "wallet_rejected"),
                WalletError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "wallet_unavailable"),
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            AppError::Deserialization(_) => (StatusCode::BAD_REQUEST, "deserialization_error"),
            AppError::NotSupported(_) => (StatusCode::NOT_IMPLEMENTED, "not_supported"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(AppError::Validation(ValidationError::InvalidTransition(
                "x".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Conflict("busy".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Wallet(WalletError::NotConnected)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Wallet(WalletError::Rejected("no".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Blockchain(BlockchainError::Connection(
                "down".to_string()
            ))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::NotSupported("x".to_string())),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_openapi_lists_session_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/session"));
        assert!(doc.paths.paths.contains_key("/commands"));
        assert!(doc.paths.paths.contains_key("/fee"));
    }
}
