use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::error;

const MAX_LOGGED_BODY: usize = 4096;

/// 记录所有 5xx 响应的请求与响应体
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!(%method, %uri, "Failed to read error response body: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        %method,
        %uri,
        status = %parts.status,
        body = %String::from_utf8_lossy(&bytes),
        "Server error"
    );

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
