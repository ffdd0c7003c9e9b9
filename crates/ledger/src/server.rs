//! HTTP request gate
//!
//! Routes the API under `/api/v1`, authenticates every request through the
//! token verifier, records per-endpoint latency, and classifies core errors
//! into status codes. The authenticated principal travels to handlers as a
//! request extension.

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info};

use crate::auth::TokenVerifier;
use crate::error::LedgerError;
use crate::handlers;
use crate::metrics;
use crate::model::ApiResponse;
use crate::service::WalletService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WalletService>,
    pub verifier: Arc<TokenVerifier>,
}

pub struct ApiServer {
    bind_addr: SocketAddr,
    state: AppState,
}

impl ApiServer {
    pub fn new(
        bind_addr: SocketAddr,
        service: Arc<WalletService>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            bind_addr,
            state: AppState { service, verifier },
        }
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route(
                "/wallets",
                post(handlers::create_wallet).get(handlers::get_wallets),
            )
            .route("/wallets/transactions", get(handlers::get_transactions))
            .route("/wallets/deposit", put(handlers::deposit))
            .route("/wallets/withdraw", put(handlers::withdraw))
            .route("/wallets/transfer", put(handlers::transfer))
            .route(
                "/wallets/:id",
                get(handlers::get_wallet_by_id)
                    .patch(handlers::update_wallet)
                    .delete(handlers::delete_wallet),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ))
            .layer(middleware::from_fn(metrics_middleware))
            .with_state(self.state.clone());

        // Metrics are served outside the auth layer.
        Router::new()
            .nest("/api/v1", api)
            .route("/metrics", get(metrics::metrics_handler))
    }

    /// Serve until the shutdown signal fires, then drain in-flight requests.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        info!("api server listening on {}", self.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        info!("api server stopped");
        Ok(())
    }
}

async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match state.verifier.verify(header_value) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(_) => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
    }
}

async fn metrics_middleware(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| format!("{} {}", request.method(), path.as_str()))
        .unwrap_or_else(|| format!("{} {}", request.method(), request.uri().path()));
    let started = Instant::now();

    let response = next.run(request).await;

    metrics::track_http_request(&endpoint, started.elapsed());
    response
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::InvalidToken | LedgerError::NotAllowed => StatusCode::UNAUTHORIZED,
            LedgerError::WalletNotFound
            | LedgerError::UserNotFound
            | LedgerError::TransactionsNotFound => StatusCode::NOT_FOUND,
            LedgerError::DuplicateTransaction => StatusCode::TOO_MANY_REQUESTS,
            LedgerError::DuplicateWallet
            | LedgerError::WrongCurrency
            | LedgerError::NotEnoughBalance
            | LedgerError::NilIdentity
            | LedgerError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::WalletWasChanged
            | LedgerError::RateUnavailable(_)
            | LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            return error_response(status, "internal server error");
        }

        error_response(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: LedgerError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            status_of(LedgerError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(LedgerError::NotAllowed), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(LedgerError::WalletNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(LedgerError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(LedgerError::TransactionsNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::DuplicateTransaction),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(LedgerError::DuplicateWallet),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LedgerError::WrongCurrency),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LedgerError::NotEnoughBalance),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LedgerError::WalletWasChanged),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(LedgerError::RateUnavailable("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let response = LedgerError::RateUnavailable("secret upstream detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Body is the fixed message; the cause only goes to the log.
    }
}
