//! Prometheus metrics for the service.
//!
//! HTTP, LLM provider and warehouse metrics behind a process-wide registry.
//! Label sets stay low-cardinality: endpoints are the static route paths and
//! status codes are grouped into classes.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static HTTP_REQUESTS_IN_PROGRESS: OnceLock<IntGaugeVec> = OnceLock::new();

// LLM provider metrics
pub static PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PROVIDER_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Warehouse metrics
pub static WAREHOUSE_QUERY_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static WAREHOUSE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Must be called once at startup; later calls are
/// no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
        ]),
        &["method", "endpoint"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    let http_in_progress = IntGaugeVec::new(
        Opts::new(
            "http_requests_in_progress",
            "HTTP requests currently in progress",
        ),
        &["method", "endpoint"],
    )
    .expect("Failed to create http_requests_in_progress metric");

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "llm_provider_latency_seconds",
            "LLM provider API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider", "model"],
    )
    .expect("Failed to create llm_provider_latency_seconds metric");

    let provider_errors = IntCounterVec::new(
        Opts::new("llm_provider_errors_total", "Total LLM provider errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create llm_provider_errors_total metric");

    let provider_tokens = IntCounterVec::new(
        Opts::new("llm_tokens_total", "Total tokens processed"),
        &["model", "type"],
    )
    .expect("Failed to create llm_tokens_total metric");

    let warehouse_duration = HistogramVec::new(
        HistogramOpts::new(
            "warehouse_query_duration_seconds",
            "Warehouse query duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create warehouse_query_duration_seconds metric");

    let warehouse_errors = IntCounterVec::new(
        Opts::new("warehouse_errors_total", "Total warehouse query errors"),
        &["operation"],
    )
    .expect("Failed to create warehouse_errors_total metric");

    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(http_in_progress.clone()))
        .expect("Failed to register http_requests_in_progress");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register llm_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register llm_provider_errors_total");
    registry
        .register(Box::new(provider_tokens.clone()))
        .expect("Failed to register llm_tokens_total");
    registry
        .register(Box::new(warehouse_duration.clone()))
        .expect("Failed to register warehouse_query_duration_seconds");
    registry
        .register(Box::new(warehouse_errors.clone()))
        .expect("Failed to register warehouse_errors_total");

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = HTTP_REQUESTS_IN_PROGRESS.set(http_in_progress);
    let _ = PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = PROVIDER_TOKENS_TOTAL.set(provider_tokens);
    let _ = WAREHOUSE_QUERY_DURATION_SECONDS.set(warehouse_duration);
    let _ = WAREHOUSE_ERRORS_TOTAL.set(warehouse_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Group status codes into classes to keep label cardinality bounded.
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter
            .with_label_values(&[method, endpoint, status_class(status)])
            .inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, endpoint])
            .observe(duration_secs);
    }
}

pub fn inc_http_in_progress(method: &str, endpoint: &str) {
    if let Some(gauge) = HTTP_REQUESTS_IN_PROGRESS.get() {
        gauge.with_label_values(&[method, endpoint]).inc();
    }
}

pub fn dec_http_in_progress(method: &str, endpoint: &str) {
    if let Some(gauge) = HTTP_REQUESTS_IN_PROGRESS.get() {
        gauge.with_label_values(&[method, endpoint]).dec();
    }
}

/// Record LLM provider latency.
pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record an LLM provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record token usage for an LLM call.
pub fn record_tokens(model: &str, input_tokens: i64, output_tokens: i64) {
    if let Some(counter) = PROVIDER_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record warehouse query duration.
pub fn record_warehouse_query(operation: &str, duration_secs: f64) {
    if let Some(histogram) = WAREHOUSE_QUERY_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

/// Record a warehouse query error.
pub fn record_warehouse_error(operation: &str) {
    if let Some(counter) = WAREHOUSE_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_group_codes() {
        assert_eq!(status_class(200), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(502), "5xx");
    }

    #[test]
    fn recording_before_init_is_a_no_op() {
        // OnceLock may or may not be initialized depending on test order;
        // either way this must not panic.
        record_http_request("GET", "/street-info", 200, 0.05);
        record_warehouse_error("bbox_for_usrn");
    }
}
