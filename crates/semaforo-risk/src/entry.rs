//! 진입 계획 계산.
//!
//! 리스크 분석의 방향 확률과 최근 캔들의 지지/저항을 이용해
//! 진입가, 손절가, 익절가, 신뢰도를 계산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use semaforo_core::{round_dp, Candle, Symbol, Timeframe, TradingConfig};

use crate::analyzer::RiskAnalysis;
use crate::signal::SignalColor;

/// 지지/저항 계산에 쓰는 최근 캔들 수.
const LEVEL_LOOKBACK: usize = 20;

/// 변동성 계산에 쓰는 최근 캔들 수.
const VOLATILITY_LOOKBACK: usize = 14;

/// 캔들이 부족할 때의 변동성 (2%).
const DEFAULT_CANDLE_VOLATILITY: f64 = 0.02;

/// 손절 거리 하한/상한 (비율).
const MIN_STOP_FRACTION: f64 = 0.005;
const MAX_STOP_FRACTION: f64 = 0.05;

/// 가격에 백분율 변화를 적용합니다. `pct`는 백분율 (증가는 양수, 감소는 음수).
///
/// 백분율은 소수점 4자리까지 정수로 스케일링하여 Decimal 연산합니다.
fn apply_pct(price: Decimal, pct: f64) -> Decimal {
    let scaled_factor = ((100.0 + pct) * 10000.0).round() as i64;
    (price * Decimal::from(scaled_factor)) / Decimal::from(1_000_000)
}

/// 두 가격 사이 거리 (진입가 대비 %).
fn distance_percent(entry: Decimal, target: Decimal) -> f64 {
    if entry.is_zero() {
        return 0.0;
    }
    ((target - entry).abs() / entry * dec!(100))
        .to_f64()
        .unwrap_or(0.0)
}

// =============================================================================
// 타입
// =============================================================================

/// 트레이드 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// 지지/저항 수준.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalLevels {
    pub resistance_1: Decimal,
    pub resistance_2: Decimal,
    pub support_1: Decimal,
    pub support_2: Decimal,
    pub pivot: Decimal,
}

impl TechnicalLevels {
    /// 최근 캔들로 계산합니다. 캔들이 없으면 현재가 기준 고정 비율을 씁니다.
    pub fn from_candles(current_price: Decimal, candles: &[Candle]) -> Self {
        let Some(last) = candles.last() else {
            return Self {
                resistance_1: apply_pct(current_price, 2.0),
                resistance_2: apply_pct(current_price, 5.0),
                support_1: apply_pct(current_price, -2.0),
                support_2: apply_pct(current_price, -5.0),
                pivot: current_price,
            };
        };

        let recent = &candles[candles.len().saturating_sub(LEVEL_LOOKBACK)..];
        let high = recent.iter().map(|c| c.high).max().unwrap_or(last.high);
        let low = recent.iter().map(|c| c.low).min().unwrap_or(last.low);
        let pivot = (high + low + last.close) / dec!(3);

        Self {
            resistance_1: high,
            resistance_2: high + (high - pivot),
            support_1: low,
            support_2: low - (pivot - low),
            pivot,
        }
    }
}

/// 진입 계획 요청.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRequest {
    pub asset: Symbol,
    pub timeframe: Timeframe,
    /// 예상 보유 기간 (예: "24h")
    pub duration: String,
    pub leverage: f64,
}

/// 계산된 진입 계획.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    pub asset: Symbol,
    pub direction: TradeDirection,
    pub timeframe: Timeframe,
    pub duration: String,
    pub entry_price: Decimal,
    pub stoploss: Decimal,
    pub stoploss_percent: f64,
    pub takeprofit: Decimal,
    pub takeprofit_percent: f64,
    pub risk_reward_ratio: f64,
    pub confidence: u32,
    pub leverage: f64,
    pub technical_levels: TechnicalLevels,
    pub timestamp: DateTime<Utc>,
}

/// 진입 계획 오류.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    #[error("Invalid current price: {0}")]
    InvalidPrice(Decimal),

    #[error("Leverage must be at least 1 (got {0})")]
    InvalidLeverage(f64),
}

// =============================================================================
// EntryOptimizer
// =============================================================================

/// 진입 계획 계산기.
#[derive(Debug, Clone)]
pub struct EntryOptimizer {
    stoploss_percent: f64,
    takeprofit_percent: f64,
    min_risk_reward: f64,
}

impl EntryOptimizer {
    /// 기본 손절/익절 비율(%)과 최소 손익비로 생성합니다.
    pub fn new(stoploss_percent: f64, takeprofit_percent: f64, min_risk_reward: f64) -> Self {
        Self {
            stoploss_percent,
            takeprofit_percent,
            min_risk_reward,
        }
    }

    /// 트레이딩 설정에서 생성합니다.
    pub fn from_settings(settings: &TradingConfig) -> Self {
        Self::new(
            settings.stoploss_percent,
            settings.takeprofit_percent,
            settings.min_risk_reward,
        )
    }

    /// 진입 계획을 계산합니다.
    pub fn plan(
        &self,
        request: &EntryRequest,
        analysis: &RiskAnalysis,
        current_price: Decimal,
        candles: &[Candle],
    ) -> Result<EntryPlan, EntryError> {
        if current_price <= Decimal::ZERO {
            return Err(EntryError::InvalidPrice(current_price));
        }
        if !request.leverage.is_finite() || request.leverage < 1.0 {
            return Err(EntryError::InvalidLeverage(request.leverage));
        }

        let direction = if analysis.probabilities.long >= analysis.probabilities.short {
            TradeDirection::Long
        } else {
            TradeDirection::Short
        };
        let levels = TechnicalLevels::from_candles(current_price, candles);
        let volatility = candle_volatility(candles);

        let entry_price = entry_price(direction, current_price, &levels);
        let stop = self.stop_loss(direction, entry_price, &levels, volatility, request.leverage);
        let take = self.take_profit(direction, entry_price, &levels, volatility, stop.percent);
        let confidence = confidence(analysis, volatility, request.timeframe);

        let risk_reward_ratio = if stop.percent > 0.0 {
            round_dp(take.percent / stop.percent, 2)
        } else {
            0.0
        };

        debug!(
            asset = %request.asset,
            direction = %direction,
            entry = %entry_price,
            stoploss = %stop.price,
            takeprofit = %take.price,
            confidence,
            "Entry plan calculated"
        );

        Ok(EntryPlan {
            asset: request.asset.clone(),
            direction,
            timeframe: request.timeframe,
            duration: request.duration.clone(),
            entry_price,
            stoploss: stop.price,
            stoploss_percent: stop.percent,
            takeprofit: take.price,
            takeprofit_percent: take.percent,
            risk_reward_ratio,
            confidence,
            leverage: request.leverage,
            technical_levels: levels,
            timestamp: Utc::now(),
        })
    }

    /// 변동성과 레버리지로 조정한 손절. 레버리지가 높을수록 좁아집니다.
    fn stop_loss(
        &self,
        direction: TradeDirection,
        entry: Decimal,
        levels: &TechnicalLevels,
        volatility: f64,
        leverage: f64,
    ) -> Target {
        let mut fraction = self.stoploss_percent / 100.0 * (1.0 + volatility * 2.0);
        if leverage > 1.0 {
            fraction /= leverage * 0.5;
        }
        let fraction = fraction.clamp(MIN_STOP_FRACTION, MAX_STOP_FRACTION);

        let price = match direction {
            TradeDirection::Long => apply_pct(entry, -fraction * 100.0).max(levels.support_2),
            TradeDirection::Short => apply_pct(entry, fraction * 100.0).min(levels.resistance_2),
        };

        Target {
            price: price.round_dp(2),
            percent: round_dp(fraction * 100.0, 2),
        }
    }

    /// 최소 손익비를 보장하되 가까운 저항/지지 앞에서 끊는 익절.
    fn take_profit(
        &self,
        direction: TradeDirection,
        entry: Decimal,
        levels: &TechnicalLevels,
        volatility: f64,
        stop_percent: f64,
    ) -> Target {
        let fraction = (self.takeprofit_percent / 100.0 * (1.0 + volatility * 1.5))
            .max(stop_percent * self.min_risk_reward / 100.0);

        let price = match direction {
            TradeDirection::Long => {
                let target = apply_pct(entry, fraction * 100.0);
                if target > apply_pct(levels.resistance_1, -5.0) {
                    apply_pct(levels.resistance_1, -1.0)
                } else {
                    target
                }
            }
            TradeDirection::Short => {
                let target = apply_pct(entry, -fraction * 100.0);
                if target < apply_pct(levels.support_1, 5.0) {
                    apply_pct(levels.support_1, 1.0)
                } else {
                    target
                }
            }
        };

        Target {
            price: price.round_dp(2),
            percent: round_dp(distance_percent(entry, price), 2),
        }
    }
}

struct Target {
    price: Decimal,
    percent: f64,
}

/// 롱은 지지선 근처, 숏은 저항선 근처에서 진입합니다.
fn entry_price(direction: TradeDirection, current: Decimal, levels: &TechnicalLevels) -> Decimal {
    let price = match direction {
        TradeDirection::Long => current.min(apply_pct(levels.support_1, 0.1)),
        TradeDirection::Short => current.max(apply_pct(levels.resistance_1, -0.1)),
    };
    price.round_dp(2)
}

/// 최근 캔들의 평균 고저 범위 비율.
fn candle_volatility(candles: &[Candle]) -> f64 {
    if candles.len() < VOLATILITY_LOOKBACK {
        return DEFAULT_CANDLE_VOLATILITY;
    }
    let recent = &candles[candles.len() - VOLATILITY_LOOKBACK..];
    recent.iter().map(Candle::range_ratio).sum::<f64>() / VOLATILITY_LOOKBACK as f64
}

/// 신호 색상, 확률 우위, 변동성, 타임프레임으로 0-100 신뢰도를 계산합니다.
fn confidence(analysis: &RiskAnalysis, volatility: f64, timeframe: Timeframe) -> u32 {
    let mut score: i32 = 50;

    score += match analysis.color {
        SignalColor::Green => 20,
        SignalColor::Yellow => 0,
        SignalColor::Red => -20,
    };
    if analysis.probabilities.max() > 60 {
        score += 10;
    }
    if volatility > 0.03 {
        score -= 10;
    }
    score += match timeframe {
        Timeframe::H1 => -5,
        Timeframe::D1 => 10,
        _ => 0,
    };

    score.clamp(0, 100) as u32
}
