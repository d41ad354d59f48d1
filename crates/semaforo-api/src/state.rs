//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 모든 API 핸들러에서 공유되는 상태를 관리합니다.
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use semaforo_core::{AppConfig, MarketDataProvider, RatioSource, Symbol, TradingConfig};
use semaforo_data::TradeMemory;
use semaforo_risk::{PendingTrade, RiskAnalysis, RiskAnalyzer, RiskModelConfig, TradeRecord};

use crate::services::RiskAggregator;
use crate::stream::{LongShortService, StreamPolicy};

/// 런타임 설정 변경 키.
pub const STOPLOSS_KEY: &str = "stoploss";
pub const TAKEPROFIT_KEY: &str = "takeprofit";
pub const MAX_TRADES_KEY: &str = "max_trades";

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
pub struct AppState {
    /// 시작 시 로드된 설정
    pub config: AppConfig,

    /// 런타임에 변경 가능한 트레이딩 파라미터
    pub trading: RwLock<TradingConfig>,

    /// 롱/숏 비율 스트림 및 단건 조회
    pub longshort: Arc<LongShortService>,

    /// 선물 시장 데이터
    pub market: Arc<dyn MarketDataProvider>,

    /// 자산별 리스크 집계기
    pub aggregator: RiskAggregator,

    /// Redis 기반 트레이드 메모리 (없으면 비활성)
    pub memory: TradeMemory,

    /// 자산별 마지막 분석 결과
    pub last_analyses: RwLock<HashMap<Symbol, RiskAnalysis>>,

    /// 확인 대기 트레이드 (최대 1건)
    pub pending_trade: RwLock<Option<PendingTrade>>,

    /// 활성 트레이드 (trade_id 순)
    pub active_trades: RwLock<BTreeMap<String, TradeRecord>>,

    /// 서버 종료 토큰. 취소되면 모든 스트림 세션이 끝납니다.
    pub shutdown: CancellationToken,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// # 인자
    /// * `config` - 애플리케이션 설정
    /// * `source` - 롱/숏 비율 소스
    /// * `market` - 선물 시장 데이터 제공자
    /// * `memory` - 트레이드 메모리
    pub fn new(
        config: AppConfig,
        source: Arc<dyn RatioSource>,
        market: Arc<dyn MarketDataProvider>,
        memory: TradeMemory,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let longshort = Arc::new(LongShortService::with_shutdown(
            source,
            StreamPolicy::from_settings(&config.stream),
            shutdown.clone(),
        ));
        let aggregator = RiskAggregator::new(
            Arc::clone(&longshort),
            Arc::clone(&market),
            RiskAnalyzer::default(),
        );

        Self {
            trading: RwLock::new(config.trading.clone()),
            config,
            longshort,
            market,
            aggregator,
            memory,
            last_analyses: RwLock::new(HashMap::new()),
            pending_trade: RwLock::new(None),
            active_trades: RwLock::new(BTreeMap::new()),
            shutdown,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 리스크 점수 모델을 교체합니다.
    #[must_use]
    pub fn with_risk_model(mut self, model: RiskModelConfig) -> Self {
        self.aggregator = RiskAggregator::new(
            Arc::clone(&self.longshort),
            Arc::clone(&self.market),
            RiskAnalyzer::new(model),
        );
        self
    }

    /// 메모리에 보관된 설정 변경과 활성 트레이드를 복원합니다.
    pub async fn restore_from_memory(&self) {
        if !self.memory.is_enabled() {
            return;
        }

        let updates = self.memory.config_updates().await;
        if !updates.is_empty() {
            let mut trading = self.trading.write().await;
            apply_config_updates(&mut trading, &updates);
            info!(
                stoploss = trading.stoploss_percent,
                takeprofit = trading.takeprofit_percent,
                max_trades = trading.max_concurrent_trades,
                "Restored config updates"
            );
        }

        let stored = self.memory.load_active_trades::<TradeRecord>().await;
        let mut active = self.active_trades.write().await;
        for (trade_id, record) in stored {
            if record.is_open() {
                active.insert(trade_id, record);
            }
        }
        info!(count = active.len(), "Restored active trades");
    }

    /// Redis 연결 상태.
    ///
    /// Redis가 설정되지 않았으면 `None`.
    pub async fn is_redis_healthy(&self) -> Option<bool> {
        let cache = self.memory.cache()?;
        Some(cache.health_check().await.unwrap_or(false))
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// 열린 트레이드 수.
    pub async fn active_trade_count(&self) -> usize {
        self.active_trades.read().await.len()
    }

    /// 모든 스트림 세션을 종료합니다.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// 저장된 설정 변경분을 트레이딩 설정에 적용합니다.
///
/// 알 수 없는 키와 타입이 맞지 않는 값은 무시합니다.
pub fn apply_config_updates(trading: &mut TradingConfig, updates: &Map<String, Value>) {
    for (key, value) in updates {
        match key.as_str() {
            STOPLOSS_KEY => match value.as_f64() {
                Some(v) if v > 0.0 => trading.stoploss_percent = v,
                _ => warn!(key, %value, "Ignoring invalid config update"),
            },
            TAKEPROFIT_KEY => match value.as_f64() {
                Some(v) if v > 0.0 => trading.takeprofit_percent = v,
                _ => warn!(key, %value, "Ignoring invalid config update"),
            },
            MAX_TRADES_KEY => match value.as_u64() {
                Some(v) if v > 0 => trading.max_concurrent_trades = v as usize,
                _ => warn!(key, %value, "Ignoring invalid config update"),
            },
            _ => {}
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 고정 비율(50/50) 소스와 변동 없는 시장, Redis 없는 메모리를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use crate::testing::{StubMarketData, StubRatioSource};
    use semaforo_core::MemoryConfig;

    AppState::new(
        AppConfig::default(),
        Arc::new(StubRatioSource::fixed(50.0, 50.0)),
        Arc::new(StubMarketData::calm()),
        TradeMemory::disabled(MemoryConfig::default()),
    )
}
