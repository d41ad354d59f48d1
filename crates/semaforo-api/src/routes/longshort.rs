//! 롱/숏 비율 endpoint.
//!
//! # 엔드포인트
//!
//! - `GET /longshort/stream/{symbol}` - SSE 스트림 (connected, loading, update, error)
//! - `GET /longshort/{symbol}` - 단건 조회
//! - `GET /status` - 심볼별 구독자 현황

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use semaforo_core::{ErrorKind, RatioSample, StreamError, StreamEvent, Symbol};

use crate::state::AppState;

// ==================== 응답 타입 ====================

/// 단건 조회 실패 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct LongShortErrorResponse {
    pub symbol: Symbol,
    pub error: String,
    pub kind: ErrorKind,
}

/// 구독 현황 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// 구독자가 있는 심볼 (정렬됨)
    pub active_symbols: Vec<Symbol>,
    /// 전체 구독자 수
    pub total_clients: usize,
    /// 심볼별 구독자 수
    pub clients_per_symbol: BTreeMap<Symbol, usize>,
    pub timestamp: String,
}

// ==================== 핸들러 ====================

/// SSE 이벤트로 변환.
fn sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// 롱/숏 비율 스트림.
///
/// 연결이 끊기면 세션이 드롭되며 진행 중인 조회도 취소됩니다.
/// GET /longshort/stream/{symbol}
pub async fn stream_longshort(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol = Symbol::new(&symbol);
    info!(symbol = %symbol, "Stream requested");

    let keep_alive = state.longshort.policy().keep_alive;
    let events = state
        .longshort
        .open(symbol)
        .into_stream()
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events).keep_alive(KeepAlive::new().interval(keep_alive)),
    )
}

/// 단건 조회.
///
/// 제한 시간 초과는 504, 그 밖의 소스 실패는 502.
/// GET /longshort/{symbol}
pub async fn get_longshort(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<RatioSample>, (StatusCode, Json<LongShortErrorResponse>)> {
    let symbol = Symbol::new(&symbol);

    state.longshort.query_once(&symbol).await.map(Json).map_err(|e| {
        let status = match e {
            StreamError::SourceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(LongShortErrorResponse {
                symbol,
                error: e.to_string(),
                kind: e.kind(),
            }),
        )
    })
}

/// 구독 현황.
///
/// GET /status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.longshort.status();

    Json(StatusResponse {
        active_symbols: snapshot.active_symbols(),
        total_clients: snapshot.total_clients(),
        clients_per_symbol: snapshot.clients_per_symbol,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// 롱/숏 라우터 생성.
pub fn longshort_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/longshort/stream/{symbol}", get(stream_longshort))
        .route("/longshort/{symbol}", get(get_longshort))
        .route("/status", get(get_status))
}
