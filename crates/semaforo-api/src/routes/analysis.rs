//! 리스크 분석 endpoint.
//!
//! POST /analyze - 자산별 신호등과 전체 신호등

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use semaforo_core::Symbol;
use semaforo_risk::{RiskAnalysis, SignalColor};

use crate::error::{validation_error, ApiResult};
use crate::state::AppState;

/// 분석 요청.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AnalyzeRequest {
    /// 분석할 자산 (없으면 설정된 자산 전체)
    #[serde(default)]
    #[validate(length(min = 1, max = 20, message = "assets must contain 1 to 20 symbols"))]
    pub assets: Option<Vec<String>>,

    /// true면 캐시된 분석을 무시
    #[serde(default)]
    pub force_refresh: bool,
}

/// 분석 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// 전체 신호등 (가장 나쁜 자산 색상)
    pub semaforo: SignalColor,
    pub emoji: String,
    pub timestamp: String,
    pub assets: BTreeMap<Symbol, RiskAnalysis>,
    pub recommendation: String,
}

/// 자산 목록을 분석합니다.
///
/// `force_refresh`가 false면 캐시 유효 시간 안의 마지막 분석을 재사용합니다.
/// POST /analyze
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    request.validate().map_err(|e| validation_error(&e))?;

    let assets: Vec<Symbol> = match &request.assets {
        Some(assets) => assets
            .iter()
            .map(Symbol::new)
            .filter(|s| !s.is_empty())
            .collect(),
        None => state.trading.read().await.assets.clone(),
    };

    let max_age = chrono::Duration::minutes(state.config.memory.analysis_cache_minutes as i64);
    let mut results = BTreeMap::new();
    let mut stale = Vec::new();

    if request.force_refresh {
        stale = assets;
    } else {
        let cached = state.last_analyses.read().await;
        for asset in assets {
            match cached.get(&asset) {
                Some(analysis) if Utc::now() - analysis.timestamp < max_age => {
                    debug!(asset = %asset, "Reusing cached analysis");
                    results.insert(asset, analysis.clone());
                }
                _ => stale.push(asset),
            }
        }
    }

    let fresh = state.aggregator.analyze_many(&stale).await;
    {
        let mut cached = state.last_analyses.write().await;
        for analysis in fresh {
            // 대체 분석은 캐시하지 않아 다음 요청에서 다시 시도
            if analysis.is_fallback() {
                results.insert(analysis.asset.clone(), analysis);
                continue;
            }
            state.memory.save_analysis(&analysis.asset, &analysis).await;
            cached.insert(analysis.asset.clone(), analysis.clone());
            results.insert(analysis.asset.clone(), analysis);
        }
    }

    let semaforo = SignalColor::worst(results.values().map(|a| a.color));
    info!(
        color = %semaforo,
        assets = results.len(),
        refreshed = stale.len(),
        "Analysis complete"
    );

    Ok(Json(AnalyzeResponse {
        semaforo,
        emoji: semaforo.emoji().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        assets: results,
        recommendation: semaforo.global_recommendation().to_string(),
    }))
}

/// 분석 라우터 생성.
pub fn analysis_router() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::state::create_test_state;
    use crate::testing::{StubMarketData, StubRatioSource};
    use semaforo_core::{AppConfig, MemoryConfig};
    use semaforo_data::TradeMemory;

    fn post_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_configured_assets() {
        let state = Arc::new(create_test_state());
        let app = analysis_router().with_state(Arc::clone(&state));

        let response = app.oneshot(post_json(serde_json::json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: AnalyzeResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(result.assets.len(), 3);
        assert_eq!(result.semaforo, SignalColor::Green);
        assert_eq!(result.recommendation, SignalColor::Green.global_recommendation());
        assert_eq!(state.last_analyses.read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_analyze_reuses_cache() {
        let state = Arc::new(create_test_state());
        let btc = Symbol::new("BTC");
        let cached = RiskAnalysis::fallback(&btc, "cached");
        state
            .last_analyses
            .write()
            .await
            .insert(btc.clone(), cached.clone());

        let app = analysis_router().with_state(Arc::clone(&state));
        let response = app
            .oneshot(post_json(serde_json::json!({ "assets": ["btc"] })))
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: AnalyzeResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(result.assets[&btc], cached);
        assert_eq!(result.semaforo, SignalColor::Yellow);
    }

    #[tokio::test]
    async fn test_analyze_force_refresh() {
        let state = Arc::new(create_test_state());
        let btc = Symbol::new("BTC");
        state
            .last_analyses
            .write()
            .await
            .insert(btc.clone(), RiskAnalysis::fallback(&btc, "cached"));

        let app = analysis_router().with_state(Arc::clone(&state));
        let response = app
            .oneshot(post_json(
                serde_json::json!({ "assets": ["BTC"], "force_refresh": true }),
            ))
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: AnalyzeResponse = serde_json::from_slice(&body).unwrap();

        assert!(!result.assets[&btc].is_fallback());
        assert!(!state.last_analyses.read().await[&btc].is_fallback());
    }

    #[tokio::test]
    async fn test_fallback_analysis_is_not_cached() {
        let state = Arc::new(AppState::new(
            AppConfig::default(),
            Arc::new(StubRatioSource::failing()),
            Arc::new(StubMarketData::calm()),
            TradeMemory::disabled(MemoryConfig::default()),
        ));
        let app = analysis_router().with_state(Arc::clone(&state));

        let response = app
            .oneshot(post_json(serde_json::json!({ "assets": ["ETH"] })))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: AnalyzeResponse = serde_json::from_slice(&body).unwrap();

        assert!(result.assets[&Symbol::new("ETH")].is_fallback());
        assert_eq!(result.semaforo, SignalColor::Yellow);
        assert!(state.last_analyses.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_asset_list() {
        let app = analysis_router().with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(post_json(serde_json::json!({ "assets": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
