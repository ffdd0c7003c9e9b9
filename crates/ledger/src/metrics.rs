//! Prometheus metrics for the request gate

use axum::http::{header, StatusCode};
use axum::response::Response;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();
static EXTERNAL_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Register the ledger metrics with the default registry. Call once at boot;
/// the trackers below are no-ops until this has run.
pub fn init_metrics() -> anyhow::Result<()> {
    HTTP_REQUESTS_TOTAL
        .set(register_int_counter_vec!(
            "http_requests_total",
            "Total number of HTTP requests.",
            &["endpoint"]
        )?)
        .map_err(|_| anyhow::anyhow!("metrics already initialized"))?;

    HTTP_REQUEST_DURATION
        .set(register_histogram_vec!(
            "http_request_duration_seconds",
            "Duration of HTTP requests.",
            &["endpoint"]
        )?)
        .map_err(|_| anyhow::anyhow!("metrics already initialized"))?;

    EXTERNAL_REQUEST_DURATION
        .set(register_histogram_vec!(
            "http_external_request_duration_seconds",
            "Duration of external HTTP requests.",
            &["endpoint"]
        )?)
        .map_err(|_| anyhow::anyhow!("metrics already initialized"))?;

    Ok(())
}

pub fn track_http_request(endpoint: &str, elapsed: Duration) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[endpoint]).inc();
    }

    if let Some(histogram) = HTTP_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }
}

pub fn track_external_request(endpoint: &str, elapsed: Duration) {
    if let Some(histogram) = EXTERNAL_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }
}

/// `GET /metrics` handler serving the Prometheus text format.
pub async fn metrics_handler() -> Result<Response<String>, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, encoder.format_type())
            .body(metrics)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
