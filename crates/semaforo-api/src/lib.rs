//! 롱/숏 비율 스트리밍 및 리스크 신호등 HTTP 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 심볼별 온디맨드 SSE 롱/숏 비율 스트림
//! - 단건 조회 및 구독 현황 엔드포인트
//! - 리스크 신호등 분석과 트레이드 관리 REST API
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`stream`]: 스트림 세션, 심볼 레지스트리, 단건 조회
//! - [`services`]: 리스크 집계
//! - [`routes`]: REST/SSE 엔드포인트
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod stream;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::*;
pub use services::RiskAggregator;
pub use state::AppState;
pub use stream::{LongShortService, StreamSession, SymbolRegistry};

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
