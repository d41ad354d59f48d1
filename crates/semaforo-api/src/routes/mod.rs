//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/longshort/stream/{symbol}` - 롱/숏 비율 SSE 스트림
//! - `/longshort/{symbol}` - 롱/숏 비율 단건 조회
//! - `/status` - 스트림 구독 현황
//! - `/analyze` - 리스크 신호등 분석
//! - `/trade`, `/confirm`, `/trades/*`, `/config` - 트레이드 관리
//! - `/api/price/{symbol}`, `/api/info` - 시세 및 봇 정보

pub mod analysis;
pub mod health;
pub mod longshort;
pub mod market;
pub mod trades;

pub use analysis::{analysis_router, AnalyzeRequest, AnalyzeResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use longshort::{longshort_router, LongShortErrorResponse, StatusResponse};
pub use market::{market_router, InfoResponse, PriceResponse};
pub use trades::{
    trades_router, ActiveTradesResponse, ConfigRequest, ConfirmResponse, TradeRequest,
    TradeResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // 롱/숏 스트림, 단건 조회, 구독 현황
        .merge(longshort_router())
        // 신호등 및 트레이드
        .merge(analysis_router())
        .merge(trades_router())
        // 시세 및 정보
        .nest("/api", market_router())
}
