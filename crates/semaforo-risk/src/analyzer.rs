//! 시장 지표 기반 리스크 분석.
//!
//! 다섯 가지 지표(펀딩비, 미결제약정, 롱/숏 비율, 청산, 변동성)에
//! 개별 위험 점수를 매기고, 가중 합산한 뒤 위험 요인을 반영해
//! 신호등 색상과 방향별 확률을 결정합니다.
//!
//! 분석은 순수 함수이며 I/O를 하지 않습니다. 데이터 수집은 호출자가
//! [`MarketSnapshot`]으로 모아 전달합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use semaforo_core::{
    close_returns_std_dev, round_dp, Candle, FundingRate, LiquidationEstimate, OpenInterest,
    Symbol,
};

use crate::config::RiskModelConfig;
use crate::signal::SignalColor;

/// 변동성을 계산할 수 없을 때 사용하는 기본값 (15%).
pub const DEFAULT_VOLATILITY: f64 = 0.15;

/// 분석 실패 시 점수.
const FALLBACK_SCORE: f64 = 50.0;

// =============================================================================
// 입력
// =============================================================================

/// 한 자산의 분석 입력.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// 펀딩비
    pub funding: FundingRate,
    /// 미결제약정
    pub open_interest: OpenInterest,
    /// 롱/숏 비율 (long% / short%)
    pub long_short_ratio: f64,
    /// 청산 추정 (조회 실패 시 None)
    pub liquidations: Option<LiquidationEstimate>,
    /// 기간 변동성 (비율)
    pub volatility: f64,
}

/// 일봉 종가 수익률 표준편차를 기간 길이로 스케일링한 변동성.
///
/// 수익률이 두 개 미만이면 `None`.
pub fn period_volatility(daily_candles: &[Candle]) -> Option<f64> {
    let periods = daily_candles.len().checked_sub(1).filter(|n| *n >= 2)?;
    let std_dev = close_returns_std_dev(daily_candles)?;
    Some(std_dev * (periods as f64).sqrt())
}

// =============================================================================
// 지표 결과
// =============================================================================

/// 펀딩비 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingMetric {
    pub current: f64,
    pub avg_24h: f64,
    /// "increasing" | "decreasing"
    pub trend: String,
    pub risk_score: f64,
    /// "extreme" | "normal"
    pub status: String,
}

/// 미결제약정 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestMetric {
    pub current: f64,
    pub change_24h_percent: f64,
    pub risk_score: f64,
    pub trend: String,
}

/// 롱/숏 비율 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongShortMetric {
    pub ratio: f64,
    pub longs_percent: f64,
    pub shorts_percent: f64,
    pub risk_score: f64,
    /// "long" | "short"
    pub bias: String,
}

/// 청산 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationMetric {
    pub total_24h: f64,
    pub longs_liquidated: f64,
    pub shorts_liquidated: f64,
    pub risk_score: f64,
    /// "longs" | "shorts"
    pub dominant_side: String,
}

/// 변동성 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityMetric {
    pub value: f64,
    pub risk_score: f64,
    /// "low" | "medium" | "high"
    pub level: String,
}

impl VolatilityMetric {
    fn is_high(&self) -> bool {
        self.level == "high"
    }
}

/// 지표별 분석 결과 묶음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub funding_rate: FundingMetric,
    pub open_interest: OpenInterestMetric,
    pub long_short_ratio: LongShortMetric,
    pub liquidations: LiquidationMetric,
    pub volatility: VolatilityMetric,
}

/// 방향별 확률 (%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionProbabilities {
    pub long: u32,
    pub short: u32,
    /// 두 확률 차이가 20%p 미만
    pub neutral: bool,
}

impl Default for DirectionProbabilities {
    fn default() -> Self {
        Self {
            long: 50,
            short: 50,
            neutral: true,
        }
    }
}

impl DirectionProbabilities {
    /// 더 큰 확률.
    pub fn max(&self) -> u32 {
        self.long.max(self.short)
    }
}

/// 자산 하나의 리스크 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub asset: Symbol,
    pub color: SignalColor,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RiskMetrics>,
    #[serde(default)]
    pub probabilities: DirectionProbabilities,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RiskAnalysis {
    /// 데이터 수집 실패 시의 보수적 결과 (노랑, 50점).
    pub fn fallback(asset: &Symbol, error: impl Into<String>) -> Self {
        Self {
            asset: asset.clone(),
            color: SignalColor::Yellow,
            risk_score: FALLBACK_SCORE,
            metrics: None,
            probabilities: DirectionProbabilities::default(),
            recommendation: "Analysis error. Proceed with caution.".to_string(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// 분석이 실패했는지 여부.
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// RiskAnalyzer
// =============================================================================

/// 리스크 분석기.
#[derive(Debug, Clone, Default)]
pub struct RiskAnalyzer {
    config: RiskModelConfig,
}

impl RiskAnalyzer {
    /// 설정으로 생성합니다.
    pub fn new(config: RiskModelConfig) -> Self {
        Self { config }
    }

    /// 스냅샷을 분석합니다.
    pub fn analyze(&self, asset: &Symbol, snapshot: &MarketSnapshot) -> RiskAnalysis {
        let metrics = RiskMetrics {
            funding_rate: analyze_funding(&snapshot.funding),
            open_interest: analyze_open_interest(&snapshot.open_interest),
            long_short_ratio: analyze_long_short(snapshot.long_short_ratio),
            liquidations: analyze_liquidations(snapshot.liquidations.as_ref()),
            volatility: analyze_volatility(snapshot.volatility),
        };

        let risk_score = self.weighted_score(&metrics);
        let color = self.color(risk_score, &metrics);
        let probabilities = direction_probabilities(&metrics);
        let recommendation = recommendation(color, &probabilities);

        debug!(
            asset = %asset,
            color = %color,
            risk_score,
            long = probabilities.long,
            short = probabilities.short,
            "Risk analysis complete"
        );

        RiskAnalysis {
            asset: asset.clone(),
            color,
            risk_score,
            metrics: Some(metrics),
            probabilities,
            recommendation,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// 가중 합산 점수 (소수 둘째 자리 반올림).
    pub fn weighted_score(&self, metrics: &RiskMetrics) -> f64 {
        let c = &self.config;
        let total = metrics.funding_rate.risk_score * c.funding_weight
            + metrics.open_interest.risk_score * c.open_interest_weight
            + metrics.long_short_ratio.risk_score * c.long_short_weight
            + metrics.liquidations.risk_score * c.liquidation_weight
            + metrics.volatility.risk_score * c.volatility_weight;
        round_dp(total, 2)
    }

    /// 점수와 위험 요인으로 색상을 결정합니다.
    pub fn color(&self, risk_score: f64, metrics: &RiskMetrics) -> SignalColor {
        let factors = risk_factors(metrics);
        let adjusted = risk_score + self.config.factor_penalty * factors as f64;

        if adjusted < self.config.green_below && factors == 0 {
            SignalColor::Green
        } else if adjusted < self.config.yellow_below {
            SignalColor::Yellow
        } else {
            SignalColor::Red
        }
    }
}

// =============================================================================
// 지표별 점수
// =============================================================================

fn analyze_funding(funding: &FundingRate) -> FundingMetric {
    let magnitude = funding.current.abs();
    let risk_score = if magnitude < 0.01 {
        0.0
    } else if magnitude < 0.02 {
        30.0
    } else if magnitude < 0.05 {
        60.0
    } else {
        90.0
    };

    FundingMetric {
        current: funding.current,
        avg_24h: funding.avg_24h,
        trend: trend(funding.current > funding.avg_24h),
        risk_score,
        status: if magnitude > 0.05 { "extreme" } else { "normal" }.to_string(),
    }
}

fn analyze_open_interest(oi: &OpenInterest) -> OpenInterestMetric {
    let change = oi.change_24h_percent;
    let risk_score = if change.abs() < 10.0 {
        20.0
    } else if change.abs() < 20.0 {
        50.0
    } else {
        80.0
    };

    OpenInterestMetric {
        current: oi.current,
        change_24h_percent: change,
        risk_score,
        trend: trend(change > 0.0),
    }
}

fn analyze_long_short(ratio: f64) -> LongShortMetric {
    let risk_score = if (0.8..=1.2).contains(&ratio) {
        10.0
    } else if (0.6..=1.6).contains(&ratio) {
        40.0
    } else {
        70.0
    };

    LongShortMetric {
        ratio,
        longs_percent: ratio / (ratio + 1.0) * 100.0,
        shorts_percent: 1.0 / (ratio + 1.0) * 100.0,
        risk_score,
        bias: if ratio > 1.0 { "long" } else { "short" }.to_string(),
    }
}

fn analyze_liquidations(estimate: Option<&LiquidationEstimate>) -> LiquidationMetric {
    let (total, longs, shorts) = estimate
        .map(|e| {
            (
                e.total_24h.unwrap_or(0.0),
                e.estimated_long_liquidations,
                e.estimated_short_liquidations,
            )
        })
        .unwrap_or((0.0, 0.0, 0.0));

    let risk_score = if total < 100_000_000.0 {
        20.0
    } else if total < 500_000_000.0 {
        50.0
    } else {
        80.0
    };

    LiquidationMetric {
        total_24h: total,
        longs_liquidated: longs,
        shorts_liquidated: shorts,
        risk_score,
        dominant_side: if longs > shorts { "longs" } else { "shorts" }.to_string(),
    }
}

fn analyze_volatility(value: f64) -> VolatilityMetric {
    let risk_score = if value < 0.10 {
        10.0
    } else if value < 0.20 {
        40.0
    } else {
        70.0
    };
    let level = if value > 0.20 {
        "high"
    } else if value > 0.10 {
        "medium"
    } else {
        "low"
    };

    VolatilityMetric {
        value,
        risk_score,
        level: level.to_string(),
    }
}

fn trend(increasing: bool) -> String {
    if increasing { "increasing" } else { "decreasing" }.to_string()
}

/// 추가 위험 요인 수: 미결제약정 감소, 비율 불균형, 양(+)의 펀딩비 과열.
///
/// 음의 펀딩비는 숏 과밀이라 요인으로 세지 않습니다.
fn risk_factors(metrics: &RiskMetrics) -> u32 {
    let ratio = metrics.long_short_ratio.ratio;
    [
        metrics.open_interest.change_24h_percent < -1.0,
        !(0.8..=1.2).contains(&ratio),
        metrics.funding_rate.current > 0.01,
    ]
    .iter()
    .filter(|hit| **hit)
    .count() as u32
}

// =============================================================================
// 방향 확률
// =============================================================================

/// 지표로부터 롱/숏 확률을 계산합니다.
///
/// 50/50에서 출발해 각 신호만큼 한쪽으로 옮깁니다. 양수 이동은 롱 쪽입니다.
fn direction_probabilities(metrics: &RiskMetrics) -> DirectionProbabilities {
    let mut shift: i32 = 0;

    // 군중과 반대 방향
    let ratio = metrics.long_short_ratio.ratio;
    if ratio < 0.9 {
        shift += 10;
    } else if ratio > 1.1 {
        shift -= 10;
    }

    let funding = metrics.funding_rate.current;
    if funding > 0.01 {
        shift -= 10;
    } else if funding < -0.01 {
        shift += 10;
    } else if funding > 0.0005 {
        shift -= 5;
    } else if funding < -0.0005 {
        shift += 5;
    }

    let oi_change = metrics.open_interest.change_24h_percent;
    if oi_change < -1.0 {
        shift -= 5;
    } else if oi_change > 2.0 {
        shift += 5;
    }

    if metrics.volatility.is_high() {
        shift -= 5;
    }

    let long = (50 + shift).clamp(0, 100) as u32;
    let short = 100 - long;

    DirectionProbabilities {
        long,
        short,
        neutral: long.abs_diff(short) < 20,
    }
}

/// 색상별 권고 문구.
fn recommendation(color: SignalColor, p: &DirectionProbabilities) -> String {
    match color {
        SignalColor::Green => format!(
            "Favorable conditions. LONG probability: {}%, SHORT: {}%",
            p.long, p.short
        ),
        SignalColor::Yellow => format!(
            "Medium risk. Wait for confirmation. LONG: {}%, SHORT: {}%",
            p.long, p.short
        ),
        SignalColor::Red => format!(
            "High risk. Stay out or reduce size. LONG: {}%, SHORT: {}%",
            p.long, p.short
        ),
    }
}
