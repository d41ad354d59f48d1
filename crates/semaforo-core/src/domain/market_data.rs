//! 선물 시장 데이터 타입.
//!
//! 가격은 `Decimal`, 비율/통계 지표는 `f64`로 표현합니다.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Symbol, Timeframe};

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 시가 시각
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 종가 대비 고저 범위 비율.
    pub fn range_ratio(&self) -> f64 {
        if self.close.is_zero() {
            return 0.0;
        }
        ((self.high - self.low) / self.close).to_f64().unwrap_or(0.0)
    }
}

/// 연속 종가 수익률의 모표준편차. 수익률을 하나도 만들 수 없으면 `None`.
pub fn close_returns_std_dev(candles: &[Candle]) -> Option<f64> {
    let closes: Vec<f64> = candles.iter().filter_map(|c| c.close.to_f64()).collect();
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// 현재 시세.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// 자산 심볼
    pub symbol: Symbol,
    /// 최근 체결가
    pub last: Decimal,
    /// 최우선 매수호가
    pub bid: Decimal,
    /// 최우선 매도호가
    pub ask: Decimal,
    /// 24시간 거래대금 (USDT)
    pub quote_volume: Decimal,
    /// 조회 시각
    pub timestamp: DateTime<Utc>,
}

/// 펀딩비 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    /// 현재(마지막 정산) 펀딩비
    pub current: f64,
    /// 다음 예상 펀딩비
    pub next: f64,
    /// 최근 24개 정산 평균
    pub avg_24h: f64,
}

impl FundingRate {
    /// 조회 실패 시 사용하는 중립 값 (0.01%).
    pub fn neutral() -> Self {
        Self {
            current: 0.0001,
            next: 0.0001,
            avg_24h: 0.0001,
        }
    }
}

/// 미결제약정 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenInterest {
    /// 현재 미결제약정 (계약 수량)
    pub current: f64,
    /// 24시간 변화량
    pub change_24h: f64,
    /// 24시간 변화율 (%)
    pub change_24h_percent: f64,
}

/// 청산 가격 및 규모 추정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEstimate {
    /// 현재가
    pub current_price: Decimal,
    /// 롱 평균 청산가 추정
    pub long_liquidation_price: Decimal,
    /// 숏 평균 청산가 추정
    pub short_liquidation_price: Decimal,
    /// 롱 청산 규모 추정
    pub estimated_long_liquidations: f64,
    /// 숏 청산 규모 추정
    pub estimated_short_liquidations: f64,
    /// 평균 레버리지 추정
    pub avg_leverage_estimate: f64,
    /// 24시간 실현 청산 총액 (공개 API에서 제공되지 않으면 None)
    pub total_24h: Option<f64>,
}
