use crate::services::metrics;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record request count, duration and in-progress gauge per route. All
/// routes here are static paths, so the raw path is a safe endpoint label.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = req.uri().path().to_string();

    metrics::inc_http_in_progress(&method, &endpoint);
    let response = next.run(req).await;
    metrics::dec_http_in_progress(&method, &endpoint);

    metrics::record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
