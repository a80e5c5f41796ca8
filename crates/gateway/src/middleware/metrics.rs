//! Per-request metrics
//!
//! Records request count and latency labelled by method, matched route
//! and status. Applied as a route layer so the matched path is known.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use navigator_common::metrics::RequestMetrics;

pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;

    metrics.finish(response.status().as_u16());
    response
}
