use crate::util::logging::standards::events;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use std::time::Instant;
use uuid::Uuid;

const SLOW_REQUEST_MS: u128 = 30_000;

/// 请求ID，由日志中间件写入请求扩展
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
}

fn parse_content_length(headers: &HeaderMap) -> usize {
    headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

fn is_quiet_path(path: &str) -> bool {
    matches!(path, "/api/health" | "/favicon.ico")
}

// 统一请求日志中间件
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = extract_client_ip(request.headers());
    let request_size = parse_content_length(request.headers());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let quiet_path = is_quiet_path(uri.path());
    if !quiet_path {
        tracing::debug!(
            target: "http.server",
            event = events::REQUEST_START,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    }

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();
    let response_size = parse_content_length(response.headers());

    if status.is_server_error() {
        tracing::error!(
            target: "http.server",
            event = events::REQUEST_ERROR,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            response_bytes = response_size,
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    } else if quiet_path {
        tracing::debug!(
            target: "http.server",
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64
        );
    } else {
        tracing::info!(
            target: "http.server",
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            response_bytes = response_size,
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    }

    // 评分本身可能很慢，只对异常耗时告警
    if !quiet_path && duration.as_millis() > SLOW_REQUEST_MS {
        tracing::warn!(
            target: "http.server",
            event = events::REQUEST_SLOW,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            duration_ms = duration.as_millis() as u64,
            status = status.as_u16()
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);

        headers.insert("x-forwarded-for", "10.0.0.5, 172.16.0.1".parse().unwrap());
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_quiet_paths() {
        assert!(is_quiet_path("/api/health"));
        assert!(!is_quiet_path("/evaluate"));
    }
}
