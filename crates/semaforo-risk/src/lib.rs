//! 리스크 신호등 및 진입 계획.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 시장 지표 기반 리스크 점수와 신호등 색상
//! - 롱/숏 방향 확률
//! - 지지/저항 기반 진입가, 손절, 익절 계산
//! - 확인 대기/활성 트레이드 기록
//!
//! # 예제
//!
//! ```rust,ignore
//! use semaforo_risk::{MarketSnapshot, RiskAnalyzer, RiskModelConfig};
//!
//! let analyzer = RiskAnalyzer::new(RiskModelConfig::default());
//! let analysis = analyzer.analyze(&symbol, &snapshot);
//! println!("{} {}", analysis.color.emoji(), analysis.recommendation);
//! ```

pub mod analyzer;
pub mod config;
pub mod entry;
pub mod signal;
pub mod trade;

// 주요 타입 재내보내기
pub use analyzer::{
    period_volatility, DirectionProbabilities, MarketSnapshot, RiskAnalysis, RiskAnalyzer,
    RiskMetrics, DEFAULT_VOLATILITY,
};
pub use config::{ConfigValidationError, RiskModelConfig};
pub use entry::{
    EntryError, EntryOptimizer, EntryPlan, EntryRequest, TechnicalLevels, TradeDirection,
};
pub use signal::SignalColor;
pub use trade::{PendingTrade, TradeRecord, TradeStatus};
