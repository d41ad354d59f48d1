//! 트레이드 준비/확인/종료 및 런타임 설정 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /trade` - 마지막 분석 기반 진입 계획 (확인 대기)
//! - `POST /confirm` - 대기 트레이드 확인
//! - `GET /trades/active` - 활성 트레이드 목록
//! - `POST /trades/{trade_id}/close` - 트레이드 종료
//! - `POST /config` - 손절/익절/동시 트레이드 수 변경

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use validator::Validate;

use semaforo_core::{Symbol, Timeframe};
use semaforo_risk::{
    EntryOptimizer, EntryPlan, EntryRequest, PendingTrade, RiskAnalysis, TradeRecord,
};

use crate::error::{bad_gateway, bad_request, not_found, validation_error, ApiResult};
use crate::state::{AppState, MAX_TRADES_KEY, STOPLOSS_KEY, TAKEPROFIT_KEY};

// ==================== 요청/응답 타입 ====================

fn default_timeframe() -> Timeframe {
    Timeframe::H4
}

fn default_duration() -> String {
    "24h".to_string()
}

fn default_leverage() -> f64 {
    1.0
}

/// 트레이드 준비 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct TradeRequest {
    #[validate(length(min = 1, max = 20, message = "asset must be 1 to 20 characters"))]
    pub asset: String,

    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,

    #[serde(default = "default_duration")]
    #[validate(length(min = 1, max = 16, message = "duration must be 1 to 16 characters"))]
    pub duration: String,

    #[serde(default = "default_leverage")]
    #[validate(range(min = 1.0, max = 125.0, message = "leverage must be between 1 and 125"))]
    pub leverage: f64,
}

/// 트레이드 준비 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct TradeResponse {
    /// 항상 "pending_confirmation"
    pub status: String,
    pub trade: PendingTrade,
    pub plan: EntryPlan,
    pub message: String,
}

/// 트레이드 확인 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    /// 항상 "confirmed"
    pub status: String,
    pub trade_id: String,
    pub trade: TradeRecord,
    pub message: String,
}

/// 활성 트레이드 목록.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveTradesResponse {
    pub count: usize,
    pub trades: BTreeMap<String, TradeRecord>,
}

/// 트레이드 종료 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct CloseResponse {
    /// 항상 "closed"
    pub status: String,
    pub trade_id: String,
    pub message: String,
}

/// 런타임 설정 변경 요청.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConfigRequest {
    #[validate(range(min = 0.1, max = 50.0, message = "stoploss_percent must be between 0.1 and 50"))]
    pub stoploss_percent: Option<f64>,

    #[validate(range(min = 0.1, max = 100.0, message = "takeprofit_percent must be between 0.1 and 100"))]
    pub takeprofit_percent: Option<f64>,

    #[validate(range(min = 1, max = 20, message = "max_trades must be between 1 and 20"))]
    pub max_trades: Option<usize>,
}

/// 런타임 설정 변경 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// 항상 "updated"
    pub status: String,
    pub updates: Map<String, Value>,
    pub message: String,
}

// ==================== 핸들러 ====================

/// 마지막 분석 (프로세스 메모리, 없으면 Redis).
async fn last_analysis(state: &AppState, asset: &Symbol) -> Option<RiskAnalysis> {
    if let Some(analysis) = state.last_analyses.read().await.get(asset) {
        return Some(analysis.clone());
    }
    state.memory.last_analysis::<RiskAnalysis>(asset).await
}

/// 진입 계획을 계산하고 확인 대기 트레이드로 저장합니다.
///
/// POST /trade
pub async fn prepare_trade(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TradeRequest>,
) -> ApiResult<Json<TradeResponse>> {
    request.validate().map_err(|e| validation_error(&e))?;

    let asset = Symbol::new(&request.asset);
    let trading = state.trading.read().await.clone();
    if !trading.is_configured(&asset) {
        return Err(bad_request(
            "ASSET_NOT_CONFIGURED",
            format!("Asset {} is not configured", asset),
        ));
    }

    let analysis = last_analysis(&state, &asset).await.ok_or_else(|| {
        bad_request("NO_ANALYSIS", "No previous analysis. Run /analyze first")
    })?;

    let ticker = state.market.ticker(&asset).await.map_err(|e| {
        warn!(asset = %asset, error = %e, "Ticker unavailable");
        bad_gateway("MARKET_DATA_ERROR", e.to_string())
    })?;
    let candles = state
        .market
        .klines(&asset, request.timeframe, trading.candle_limit)
        .await
        .unwrap_or_else(|e| {
            warn!(asset = %asset, error = %e, "Candles unavailable, using price-based levels");
            Vec::new()
        });

    let entry = EntryRequest {
        asset: asset.clone(),
        timeframe: request.timeframe,
        duration: request.duration.clone(),
        leverage: request.leverage,
    };
    let plan = EntryOptimizer::from_settings(&trading)
        .plan(&entry, &analysis, ticker.last, &candles)
        .map_err(|e| bad_request("INVALID_ENTRY", e.to_string()))?;

    let pending = PendingTrade::from_plan(&plan, analysis.color);
    state.memory.save_pending_trade(&pending).await;
    *state.pending_trade.write().await = Some(pending.clone());

    info!(
        asset = %asset,
        direction = %plan.direction,
        entry = %plan.entry_price,
        "Trade pending confirmation"
    );

    Ok(Json(TradeResponse {
        status: "pending_confirmation".to_string(),
        message: pending.confirmation_prompt(),
        trade: pending,
        plan,
    }))
}

/// 대기 트레이드를 확인하여 활성 트레이드로 옮깁니다.
///
/// POST /confirm
pub async fn confirm_trade(State(state): State<Arc<AppState>>) -> ApiResult<Json<ConfirmResponse>> {
    // 대기 슬롯을 쓰기 잠금으로 잡은 채 꺼내야 동시 확인이 같은 트레이드를 두 번 열지 않음
    let mut slot = state.pending_trade.write().await;
    let pending = match slot.take() {
        Some(pending) => Some(pending),
        None => state.memory.pending_trade::<PendingTrade>().await,
    };
    let pending = pending
        .ok_or_else(|| bad_request("NO_PENDING_TRADE", "No pending trade to confirm"))?;

    let max_trades = state.trading.read().await.max_concurrent_trades;
    let record = {
        let mut active = state.active_trades.write().await;
        if active.len() >= max_trades {
            *slot = Some(pending);
            return Err(bad_request(
                "MAX_TRADES_REACHED",
                format!("Maximum concurrent trades reached ({})", max_trades),
            ));
        }

        let record = TradeRecord::open(pending, Utc::now());
        active.insert(record.trade_id.clone(), record.clone());
        record
    };
    state.memory.clear_pending_trade().await;
    drop(slot);

    state
        .memory
        .save_active_trade(&record.trade_id, &record)
        .await;

    info!(trade_id = %record.trade_id, "Trade confirmed");

    Ok(Json(ConfirmResponse {
        status: "confirmed".to_string(),
        trade_id: record.trade_id.clone(),
        trade: record,
        message: "Trade opened and saved to memory.".to_string(),
    }))
}

/// 활성 트레이드 목록.
///
/// GET /trades/active
pub async fn active_trades(State(state): State<Arc<AppState>>) -> Json<ActiveTradesResponse> {
    let trades = state.active_trades.read().await.clone();
    Json(ActiveTradesResponse {
        count: trades.len(),
        trades,
    })
}

/// 트레이드를 닫고 이력으로 옮깁니다.
///
/// POST /trades/{trade_id}/close
pub async fn close_trade(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<String>,
) -> ApiResult<Json<CloseResponse>> {
    let mut record = state
        .active_trades
        .write()
        .await
        .remove(&trade_id)
        .ok_or_else(|| not_found("TRADE_NOT_FOUND", format!("Trade {} not found", trade_id)))?;

    record.close(Utc::now());
    state.memory.move_to_history(&trade_id, &record).await;

    info!(trade_id = %trade_id, "Trade closed");

    Ok(Json(CloseResponse {
        status: "closed".to_string(),
        message: format!("Trade {} closed", trade_id),
        trade_id,
    }))
}

/// 손절/익절/동시 트레이드 수를 변경합니다.
///
/// POST /config
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfigRequest>,
) -> ApiResult<Json<ConfigResponse>> {
    request.validate().map_err(|e| validation_error(&e))?;

    let mut updates = Map::new();
    {
        let mut trading = state.trading.write().await;
        if let Some(stoploss) = request.stoploss_percent {
            trading.stoploss_percent = stoploss;
            updates.insert(STOPLOSS_KEY.to_string(), Value::from(stoploss));
        }
        if let Some(takeprofit) = request.takeprofit_percent {
            trading.takeprofit_percent = takeprofit;
            updates.insert(TAKEPROFIT_KEY.to_string(), Value::from(takeprofit));
        }
        if let Some(max_trades) = request.max_trades {
            trading.max_concurrent_trades = max_trades;
            updates.insert(MAX_TRADES_KEY.to_string(), Value::from(max_trades));
        }
    }

    if updates.is_empty() {
        return Err(bad_request(
            "NO_UPDATES",
            "Provide at least one of stoploss_percent, takeprofit_percent, max_trades",
        ));
    }

    state.memory.save_config_updates(updates.clone()).await;
    info!(?updates, "Trading config updated");

    Ok(Json(ConfigResponse {
        status: "updated".to_string(),
        updates,
        message: "Configuration updated".to_string(),
    }))
}

/// 트레이드 라우터 생성.
pub fn trades_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trade", post(prepare_trade))
        .route("/confirm", post(confirm_trade))
        .route("/trades/active", get(active_trades))
        .route("/trades/{trade_id}/close", post(close_trade))
        .route("/config", post(update_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use crate::error::ApiErrorResponse;
    use crate::state::create_test_state;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn state_with_analysis(asset: &str) -> Arc<AppState> {
        let state = Arc::new(create_test_state());
        let symbol = Symbol::new(asset);
        let analysis = state.aggregator.analyze(&symbol).await;
        state.last_analyses.write().await.insert(symbol, analysis);
        state
    }

    #[tokio::test]
    async fn test_trade_requires_configured_asset() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json("/trade", serde_json::json!({ "asset": "doge" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = body_json(response).await;
        assert_eq!(error.code, "ASSET_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_trade_requires_analysis() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json("/trade", serde_json::json!({ "asset": "BTC" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = body_json(response).await;
        assert_eq!(error.code, "NO_ANALYSIS");
    }

    #[tokio::test]
    async fn test_trade_rejects_leverage() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json(
                "/trade",
                serde_json::json!({ "asset": "BTC", "leverage": 500.0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = body_json(response).await;
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_trade_confirm_close_flow() {
        let state = state_with_analysis("BTC").await;

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json(
                "/trade",
                serde_json::json!({ "asset": "btc", "timeframe": "1h" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let prepared: TradeResponse = body_json(response).await;
        assert_eq!(prepared.status, "pending_confirmation");
        assert_eq!(prepared.trade.asset, Symbol::new("BTC"));
        assert_eq!(prepared.trade.timeframe, Timeframe::H1);
        assert!(prepared.message.ends_with("Confirm trade?"));
        assert!(state.pending_trade.read().await.is_some());

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json("/confirm", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let confirmed: ConfirmResponse = body_json(response).await;
        assert!(confirmed.trade_id.starts_with("BTC_"));
        assert!(state.pending_trade.read().await.is_none());
        assert_eq!(state.active_trade_count().await, 1);

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json(
                &format!("/trades/{}/close", confirmed.trade_id),
                Value::Null,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.active_trade_count().await, 0);
    }

    #[tokio::test]
    async fn test_confirm_without_pending() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json("/confirm", Value::Null))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = body_json(response).await;
        assert_eq!(error.code, "NO_PENDING_TRADE");
    }

    #[tokio::test]
    async fn test_confirm_respects_max_trades() {
        let state = state_with_analysis("ETH").await;

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json("/trade", serde_json::json!({ "asset": "ETH" })))
            .await
            .unwrap();
        let prepared: TradeResponse = body_json(response).await;

        let existing = TradeRecord::open(prepared.trade, Utc::now());
        state
            .active_trades
            .write()
            .await
            .insert(existing.trade_id.clone(), existing);
        state.trading.write().await.max_concurrent_trades = 1;

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json("/confirm", Value::Null))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = body_json(response).await;
        assert_eq!(error.code, "MAX_TRADES_REACHED");
        assert!(state.pending_trade.read().await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_open_one_trade() {
        let state = state_with_analysis("BTC").await;

        let response = trades_router()
            .with_state(Arc::clone(&state))
            .oneshot(post_json("/trade", serde_json::json!({ "asset": "BTC" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let confirms: Vec<_> = (0..4)
            .map(|_| {
                let app = trades_router().with_state(Arc::clone(&state));
                tokio::spawn(async move {
                    app.oneshot(post_json("/confirm", Value::Null))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut confirmed = 0;
        for handle in confirms {
            let response = handle.await.unwrap();
            if response.status() == StatusCode::OK {
                confirmed += 1;
            } else {
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
                let error: ApiErrorResponse = body_json(response).await;
                assert_eq!(error.code, "NO_PENDING_TRADE");
            }
        }

        assert_eq!(confirmed, 1);
        assert_eq!(state.active_trade_count().await, 1);
        assert!(state.pending_trade.read().await.is_none());
    }

    #[tokio::test]
    async fn test_close_unknown_trade() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json("/trades/BTC_20240101_000000/close", Value::Null))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_config() {
        let state = Arc::new(create_test_state());
        let app = trades_router().with_state(Arc::clone(&state));

        let response = app
            .oneshot(post_json(
                "/config",
                serde_json::json!({ "stoploss_percent": 1.5, "max_trades": 5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result: ConfigResponse = body_json(response).await;
        assert_eq!(result.updates["stoploss"], 1.5);
        assert_eq!(result.updates["max_trades"], 5);

        let trading = state.trading.read().await;
        assert_eq!(trading.stoploss_percent, 1.5);
        assert_eq!(trading.max_concurrent_trades, 5);
        assert_eq!(trading.takeprofit_percent, 4.0);
    }

    #[tokio::test]
    async fn test_update_config_validation() {
        let app = trades_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json("/config", serde_json::json!({ "max_trades": 0 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
