use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

static PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time-ms");

/// Stamps every response with wall-clock handler time in milliseconds.
pub async fn process_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}")) {
        response
            .headers_mut()
            .insert(PROCESS_TIME_HEADER.clone(), value);
    }

    response
}

/// Logs failed responses after the handler ran. Server errors are
/// logged at error level, client errors at warn.
pub async fn log_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        error!(%method, %path, status = %status, "request failed");
    } else if status.is_client_error() {
        warn!(%method, %path, status = %status, "request rejected");
    }

    response
}
