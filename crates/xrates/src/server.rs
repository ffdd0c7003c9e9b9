//! HTTP server for exchange-rate lookups

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Response envelope: exactly one of `data` / `error` is populated.
#[derive(Debug, Serialize)]
pub struct HttpResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct XrResponse {
    pub xr: f64,
}

#[derive(Debug, Deserialize)]
pub struct XrRequest {
    pub base: String,
    pub target: String,
}

/// Reference-currency table: code → units of the reference per unit.
#[derive(Debug, Clone)]
pub struct RateTable {
    currencies: HashMap<String, f64>,
}

impl Default for RateTable {
    fn default() -> Self {
        let currencies = HashMap::from([
            ("RUB".to_string(), 1.0),
            ("USD".to_string(), 90.53),
            ("EUR".to_string(), 97.53),
            ("KZT".to_string(), 20.0115),
            ("IDR".to_string(), 0.00579328),
        ]);

        Self { currencies }
    }
}

impl RateTable {
    /// Directional rate: multiply an amount in `base` by this to get the
    /// equivalent in `target`. None when either code is unknown.
    pub fn exchange_rate(&self, base: &str, target: &str) -> Option<f64> {
        let base_k = self.currencies.get(base)?;
        let target_k = self.currencies.get(target)?;

        Some(base_k / target_k)
    }
}

pub struct RateServer {
    bind_addr: SocketAddr,
    table: Arc<RateTable>,
}

impl RateServer {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            table: Arc::new(RateTable::default()),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/xr", get(get_exchange_rate))
            .with_state(self.table.clone())
    }

    /// Serve until the shutdown signal fires, then drain in-flight requests.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        info!("xr server listening on {}", self.bind_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        info!("xr server stopped");
        Ok(())
    }
}

async fn get_exchange_rate(
    State(table): State<Arc<RateTable>>,
    query: Result<Query<XrRequest>, QueryRejection>,
) -> Response {
    let Ok(Query(request)) = query else {
        return error_response(StatusCode::BAD_REQUEST, "error getting params");
    };

    match table.exchange_rate(&request.base, &request.target) {
        Some(xr) => {
            debug!(xr, base = %request.base, target = %request.target, "resolved rate");
            (
                StatusCode::OK,
                Json(HttpResponse {
                    data: Some(XrResponse { xr }),
                    error: None,
                }),
            )
                .into_response()
        }
        None => error_response(StatusCode::BAD_REQUEST, "wrong currency"),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(HttpResponse::<XrResponse> {
            data: None,
            error: Some(message.to_string()),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn test_directional_rate() {
        let table = RateTable::default();

        let usd_to_rub = table.exchange_rate("USD", "RUB").unwrap();
        assert!((usd_to_rub - 90.53).abs() < 1e-9);

        let rub_to_usd = table.exchange_rate("RUB", "USD").unwrap();
        assert!((rub_to_usd - 1.0 / 90.53).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_property() {
        let table = RateTable::default();
        let codes = ["RUB", "USD", "EUR", "KZT", "IDR"];

        for base in codes {
            for target in codes {
                let there = table.exchange_rate(base, target).unwrap();
                let back = table.exchange_rate(target, base).unwrap();
                assert!(
                    (there * back - 1.0).abs() < 1e-9,
                    "{base}->{target} round trip drifted"
                );
            }
        }
    }

    #[test]
    fn test_unknown_currency() {
        let table = RateTable::default();

        assert!(table.exchange_rate("XXX", "USD").is_none());
        assert!(table.exchange_rate("USD", "XXX").is_none());
    }

    async fn request(uri: &str) -> (StatusCode, serde_json::Value) {
        let server = RateServer::new("127.0.0.1:0".parse().unwrap());
        let response = server
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_get_xr_ok() {
        let (status, body) = request("/xr?base=USD&target=RUB").await;

        assert_eq!(status, StatusCode::OK);
        let xr = body["data"]["xr"].as_f64().unwrap();
        assert!((xr - 90.53).abs() < 1e-9);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_get_xr_wrong_currency() {
        let (status, body) = request("/xr?base=XXX&target=RUB").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "wrong currency");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_get_xr_missing_params() {
        let (status, body) = request("/xr?base=USD").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "error getting params");
    }
}
