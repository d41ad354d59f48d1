//! 확인 대기 및 활성 트레이드 기록.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use semaforo_core::{Symbol, Timeframe};

use crate::entry::{EntryPlan, TradeDirection};
use crate::signal::SignalColor;

/// 트레이드 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// 사용자 확인을 기다리는 트레이드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTrade {
    pub asset: Symbol,
    pub timeframe: Timeframe,
    pub duration: String,
    pub direction: TradeDirection,
    pub entry_price: Decimal,
    pub stoploss: Decimal,
    pub stoploss_percent: f64,
    pub takeprofit: Decimal,
    pub takeprofit_percent: f64,
    pub confidence: u32,
    pub leverage: f64,
    /// 계획 시점의 신호 색상
    pub risk_color: SignalColor,
    pub timestamp: DateTime<Utc>,
}

impl PendingTrade {
    /// 진입 계획과 당시 신호 색상으로 생성합니다.
    pub fn from_plan(plan: &EntryPlan, risk_color: SignalColor) -> Self {
        Self {
            asset: plan.asset.clone(),
            timeframe: plan.timeframe,
            duration: plan.duration.clone(),
            direction: plan.direction,
            entry_price: plan.entry_price,
            stoploss: plan.stoploss,
            stoploss_percent: plan.stoploss_percent,
            takeprofit: plan.takeprofit,
            takeprofit_percent: plan.takeprofit_percent,
            confidence: plan.confidence,
            leverage: plan.leverage,
            risk_color,
            timestamp: Utc::now(),
        }
    }

    /// 확인 요청 문구.
    pub fn confirmation_prompt(&self) -> String {
        format!(
            "Ideal entry at {}, SL {}%, TP {}%. Confirm trade?",
            self.entry_price, self.stoploss_percent, self.takeprofit_percent
        )
    }
}

/// 확인된 트레이드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    #[serde(flatten)]
    pub trade: PendingTrade,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_timestamp: Option<DateTime<Utc>>,
}

impl TradeRecord {
    /// `ASSET_YYYYmmdd_HHMMSS` 형식의 트레이드 ID.
    pub fn make_id(asset: &Symbol, at: DateTime<Utc>) -> String {
        format!("{}_{}", asset, at.format("%Y%m%d_%H%M%S"))
    }

    /// 대기 트레이드를 `at` 시각에 엽니다.
    pub fn open(trade: PendingTrade, at: DateTime<Utc>) -> Self {
        Self {
            trade_id: Self::make_id(&trade.asset, at),
            trade,
            status: TradeStatus::Open,
            opened_at: at,
            close_timestamp: None,
        }
    }

    /// 트레이드를 닫습니다.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.status = TradeStatus::Closed;
        self.close_timestamp = Some(at);
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }
}
