//! Exchange-rate resolution against the pricing service
//!
//! The client is stateless and safe for concurrent use; the shared HTTP
//! client carries a 10-second hard timeout that bounds every lookup
//! independently of the caller's deadline.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::metrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client instance (reused across all requests)
static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::RateUnavailable(format!("failed to create HTTP client: {e}")))
    })
}

/// Source of directional exchange rates.
///
/// `rate(base, target)` is a positive factor such that an amount in `base`
/// multiplied by it yields the equivalent amount in `target`.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn rate(&self, base: &str, target: &str) -> Result<Decimal>;
}

/// Rate source backed by the pricing service's `/xr` endpoint.
pub struct RemoteRateClient {
    endpoint: String,
}

impl RemoteRateClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            endpoint: format!("{}/xr", base_url.trim_end_matches('/')),
        }
    }
}

#[derive(Debug, Deserialize)]
struct XrEnvelope {
    data: XrPayload,
}

#[derive(Debug, Deserialize)]
struct XrPayload {
    xr: f64,
}

#[async_trait]
impl RateSource for RemoteRateClient {
    async fn rate(&self, base: &str, target: &str) -> Result<Decimal> {
        let started = Instant::now();

        let response = http_client()?
            .get(&self.endpoint)
            .query(&[("base", base), ("target", target)])
            .send()
            .await
            .map_err(|e| LedgerError::RateUnavailable(format!("request failed: {e}")))?;

        metrics::track_external_request("xr", started.elapsed());

        match response.status() {
            StatusCode::BAD_REQUEST => return Err(LedgerError::WrongCurrency),
            status if status.is_server_error() => {
                return Err(LedgerError::RateUnavailable(format!(
                    "pricing service returned {status}"
                )));
            }
            _ => {}
        }

        let envelope: XrEnvelope = response
            .json()
            .await
            .map_err(|e| LedgerError::RateUnavailable(format!("bad response body: {e}")))?;

        let factor = Decimal::from_f64(envelope.data.xr)
            .filter(|factor| factor.is_sign_positive() && !factor.is_zero())
            .ok_or_else(|| {
                LedgerError::RateUnavailable(format!("invalid rate {}", envelope.data.xr))
            })?;

        debug!(base, target, %factor, "resolved exchange rate");

        Ok(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_resolves_rate() {
        let router = Router::new().route(
            "/xr",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("base").map(String::as_str), Some("USD"));
                assert_eq!(params.get("target").map(String::as_str), Some("RUB"));
                Json(serde_json::json!({"data": {"xr": 90.53}}))
            }),
        );

        let client = RemoteRateClient::new(serve(router).await);
        let factor = client.rate("USD", "RUB").await.unwrap();

        assert_eq!(factor, Decimal::from_f64(90.53).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_currency_maps_to_wrong_currency() {
        let router = Router::new().route(
            "/xr",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "wrong currency"})),
                )
            }),
        );

        let client = RemoteRateClient::new(serve(router).await);
        let result = client.rate("XXX", "USD").await;

        assert!(matches!(result, Err(LedgerError::WrongCurrency)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let router = Router::new().route(
            "/xr",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR.into_response() }),
        );

        let client = RemoteRateClient::new(serve(router).await);
        let result = client.rate("USD", "EUR").await;

        assert!(matches!(result, Err(LedgerError::RateUnavailable(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_unavailable() {
        let router = Router::new().route("/xr", get(|| async { "not json" }));

        let client = RemoteRateClient::new(serve(router).await);
        let result = client.rate("USD", "EUR").await;

        assert!(matches!(result, Err(LedgerError::RateUnavailable(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_unavailable() {
        // Bind then drop the listener so the port is closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RemoteRateClient::new(format!("http://{addr}"));
        let result = client.rate("USD", "EUR").await;

        assert!(matches!(result, Err(LedgerError::RateUnavailable(_))));
    }

    #[tokio::test]
    async fn test_non_positive_rate_rejected() {
        let router = Router::new().route(
            "/xr",
            get(|| async { Json(serde_json::json!({"data": {"xr": 0.0}})) }),
        );

        let client = RemoteRateClient::new(serve(router).await);
        let result = client.rate("USD", "EUR").await;

        assert!(matches!(result, Err(LedgerError::RateUnavailable(_))));
    }
}
