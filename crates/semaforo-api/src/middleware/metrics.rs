//! HTTP 요청 metrics middleware.
//!
//! 일반 요청은 처리 시간을, SSE 스트림은 연결 수를 기록합니다.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
    record_stream_opened,
};

/// 응답이 `text/event-stream`인지 확인.
///
/// 스트림 응답은 헤더만 먼저 나가고 본문이 연결 종료까지 이어지므로
/// 헤더까지의 시간은 처리 시간으로 의미가 없습니다.
fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total` / `http_responses_total`: 모든 요청
/// - `http_request_duration_seconds`: 스트림이 아닌 응답만
/// - `longshort_stream_connections_total`: 성공한 SSE 연결
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    record_http_request(&method, &path);
    let response = next.run(request).await;

    let status = response.status();
    record_http_response(&method, &path, status.as_u16());

    if status.is_success() && is_event_stream(response.headers()) {
        record_stream_opened(&path);
    } else {
        record_http_duration(&method, &path, started.elapsed().as_secs_f64());
    }

    response
}
