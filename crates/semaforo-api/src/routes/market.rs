//! 시세 및 봇 정보 endpoint.
//!
//! - `GET /api/price/{symbol}` - 현재 시세
//! - `GET /api/info` - 봇 상태 요약

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use semaforo_core::Symbol;

use crate::error::{bad_gateway, ApiResult};
use crate::state::AppState;

/// 봇 이름.
pub const BOT_NAME: &str = "SemaforoBot";

/// 시세 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: Symbol,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: String,
}

/// 봇 정보 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub bot: String,
    pub version: String,
    pub status: String,
    pub active_trades: usize,
    pub pending_trade: bool,
    pub timestamp: String,
}

/// 현재 시세.
///
/// GET /api/price/{symbol}
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<PriceResponse>> {
    let symbol = Symbol::new(&symbol);
    let ticker = state.market.ticker(&symbol).await.map_err(|e| {
        warn!(symbol = %symbol, error = %e, "Price lookup failed");
        bad_gateway("MARKET_DATA_ERROR", e.to_string())
    })?;

    Ok(Json(PriceResponse {
        symbol,
        price: ticker.last,
        bid: ticker.bid,
        ask: ticker.ask,
        timestamp: ticker.timestamp.to_rfc3339(),
    }))
}

/// 봇 상태 요약.
///
/// GET /api/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        bot: BOT_NAME.to_string(),
        version: state.version.clone(),
        status: "running".to_string(),
        active_trades: state.active_trade_count().await,
        pending_trade: state.pending_trade.read().await.is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// 시세/정보 라우터 생성.
pub fn market_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/price/{symbol}", get(get_price))
        .route("/info", get(get_info))
}
