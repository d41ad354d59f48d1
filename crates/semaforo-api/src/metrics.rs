//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 스트림 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 반환값
///
/// `/metrics` 엔드포인트에서 메트릭을 렌더링하기 위한 `PrometheusHandle`
///
/// # Errors
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        // HTTP 요청 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("longshort_fetch_duration_seconds".to_string()),
            &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 스트림 메트릭 헬퍼 함수
// ============================================================================

/// 활성 세션 수와 활성 심볼 수 설정.
pub fn set_stream_gauges(sessions: usize, symbols: usize) {
    gauge!("longshort_stream_sessions_active").set(sessions as f64);
    gauge!("longshort_symbols_active").set(symbols as f64);
}

/// 소스 조회 결과 카운터 증가.
///
/// `outcome`은 `ok` 또는 에러 종류 (`timeout`, `unavailable`, `invalid_sample`).
pub fn record_fetch(symbol: &str, outcome: &str) {
    counter!(
        "longshort_fetch_total",
        "symbol" => symbol.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 소스 조회 지속 시간 기록.
pub fn record_fetch_duration(symbol: &str, duration_secs: f64) {
    histogram!("longshort_fetch_duration_seconds", "symbol" => symbol.to_string())
        .record(duration_secs);
}

/// SSE 스트림 연결 카운터 증가.
pub fn record_stream_opened(path: &str) {
    counter!("longshort_stream_connections_total", "path" => path.to_string()).increment(1);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/longshort/stream/btc` → `/longshort/stream/:symbol`,
/// `/trades/BTC_20240102_030405/close` → `/trades/:id/close`
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let previous = if i > 0 { segments[i - 1] } else { "" };

        let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
        let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
        let is_trade_id = previous == "trades" && segment.contains('_');
        let is_symbol = !segment.is_empty()
            && *segment != "stream"
            && matches!(previous, "longshort" | "stream" | "price");

        let value = if is_uuid || is_numeric || is_trade_id {
            ":id"
        } else if is_symbol {
            ":symbol"
        } else {
            segment
        };
        normalized.push(value);
    }

    normalized.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/sessions/123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(normalize_path(path), "/api/v1/sessions/:id");
    }

    #[test]
    fn test_normalize_path_symbols() {
        assert_eq!(normalize_path("/longshort/stream/btc"), "/longshort/stream/:symbol");
        assert_eq!(normalize_path("/longshort/ETH"), "/longshort/:symbol");
        assert_eq!(normalize_path("/api/price/SOL"), "/api/price/:symbol");
    }

    #[test]
    fn test_normalize_path_trade_id() {
        assert_eq!(
            normalize_path("/trades/BTC_20240102_030405/close"),
            "/trades/:id/close"
        );
        assert_eq!(normalize_path("/trades/active"), "/trades/active");
    }

    #[test]
    fn test_normalize_path_no_params() {
        assert_eq!(normalize_path("/status"), "/status");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
