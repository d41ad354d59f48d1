//! Best-effort 트레이드 메모리.
//!
//! 분석 결과, 확인 대기 트레이드, 활성 트레이드, 트레이드 이력, 런타임 설정 변경을
//! Redis에 보관합니다. 모든 실패는 `warn!`으로 기록하고 삼키며, Redis가 없으면
//! 저장은 무시되고 조회는 빈 값을 반환합니다.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use semaforo_core::{MemoryConfig, Symbol};

use crate::storage::redis::RedisCache;

// =============================================================================
// 키
// =============================================================================

const PENDING_TRADE_KEY: &str = "semaforo:pending_trade";
const ACTIVE_TRADES_KEY: &str = "semaforo:active_trades";
const TRADE_HISTORY_PREFIX: &str = "semaforo:trade_history";
const CONFIG_UPDATES_KEY: &str = "semaforo:config_updates";

fn analysis_key(asset: &Symbol) -> String {
    format!("semaforo:analysis:{}", asset)
}

fn active_trade_key(trade_id: &str) -> String {
    format!("{}:{}", ACTIVE_TRADES_KEY, trade_id)
}

fn history_key(trade_id: &str) -> String {
    format!("{}:{}", TRADE_HISTORY_PREFIX, trade_id)
}

// =============================================================================
// TradeMemory
// =============================================================================

/// 봇 상태 메모리.
#[derive(Clone)]
pub struct TradeMemory {
    cache: Option<RedisCache>,
    settings: MemoryConfig,
}

impl TradeMemory {
    /// 캐시(선택)와 보존 설정으로 생성합니다.
    pub fn new(cache: Option<RedisCache>, settings: MemoryConfig) -> Self {
        Self { cache, settings }
    }

    /// Redis 없이 동작하는 메모리.
    pub fn disabled(settings: MemoryConfig) -> Self {
        Self::new(None, settings)
    }

    /// Redis 연결 여부.
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// 내부 캐시 (헬스 체크용).
    pub fn cache(&self) -> Option<&RedisCache> {
        self.cache.as_ref()
    }

    // ---- 분석 ----

    /// 자산별 분석 결과를 `analysis_cache_minutes` 동안 보관합니다.
    pub async fn save_analysis<T: Serialize>(&self, asset: &Symbol, analysis: &T) {
        let Some(cache) = &self.cache else { return };
        let ttl = self.settings.analysis_ttl_secs();
        if let Err(e) = cache.set_with_ttl(&analysis_key(asset), analysis, ttl).await {
            warn!(asset = %asset, error = %e, "Failed to save analysis");
        }
    }

    /// 마지막 분석 결과.
    pub async fn last_analysis<T: DeserializeOwned>(&self, asset: &Symbol) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(&analysis_key(asset)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(asset = %asset, error = %e, "Failed to load analysis");
                None
            }
        }
    }

    // ---- 확인 대기 트레이드 ----

    /// 확인 대기 트레이드를 저장합니다.
    pub async fn save_pending_trade<T: Serialize>(&self, trade: &T) {
        let Some(cache) = &self.cache else { return };
        let ttl = self.settings.pending_trade_ttl_secs;
        if let Err(e) = cache.set_with_ttl(PENDING_TRADE_KEY, trade, ttl).await {
            warn!(error = %e, "Failed to save pending trade");
        }
    }

    /// 확인 대기 트레이드.
    pub async fn pending_trade<T: DeserializeOwned>(&self) -> Option<T> {
        let cache = self.cache.as_ref()?;
        cache.get(PENDING_TRADE_KEY).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load pending trade");
            None
        })
    }

    /// 확인 대기 트레이드를 지웁니다.
    pub async fn clear_pending_trade(&self) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = cache.delete(PENDING_TRADE_KEY).await {
            warn!(error = %e, "Failed to clear pending trade");
        }
    }

    // ---- 활성 트레이드 ----

    /// 활성 트레이드를 만료 없이 저장하고 목록에 등록합니다.
    pub async fn save_active_trade<T: Serialize>(&self, trade_id: &str, trade: &T) {
        let Some(cache) = &self.cache else { return };
        let result = async {
            cache.set(&active_trade_key(trade_id), trade).await?;
            cache.sadd(ACTIVE_TRADES_KEY, trade_id).await
        }
        .await;

        if let Err(e) = result {
            warn!(trade_id, error = %e, "Failed to save active trade");
        }
    }

    /// 모든 활성 트레이드. 본문이 없거나 깨진 항목은 건너뜁니다.
    pub async fn load_active_trades<T: DeserializeOwned>(&self) -> HashMap<String, T> {
        let mut trades = HashMap::new();
        let Some(cache) = &self.cache else {
            return trades;
        };

        let ids = match cache.smembers(ACTIVE_TRADES_KEY).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to list active trades");
                return trades;
            }
        };

        for id in ids {
            match cache.get::<T>(&active_trade_key(&id)).await {
                Ok(Some(trade)) => {
                    trades.insert(id, trade);
                }
                Ok(None) => debug!(trade_id = %id, "Active trade body missing"),
                Err(e) => warn!(trade_id = %id, error = %e, "Failed to load active trade"),
            }
        }

        trades
    }

    /// 닫힌 트레이드를 이력으로 옮기고 활성 목록에서 제거합니다.
    pub async fn move_to_history<T: Serialize>(&self, trade_id: &str, trade: &T) {
        let Some(cache) = &self.cache else { return };
        let ttl = self.settings.history_ttl_secs();
        let result = async {
            cache.set_with_ttl(&history_key(trade_id), trade, ttl).await?;
            cache.delete(&active_trade_key(trade_id)).await?;
            cache.srem(ACTIVE_TRADES_KEY, trade_id).await
        }
        .await;

        if let Err(e) = result {
            warn!(trade_id, error = %e, "Failed to move trade to history");
        }
    }

    // ---- 설정 변경 ----

    /// 기존 변경분에 병합하고 `last_update` 시각을 기록합니다.
    pub async fn save_config_updates(&self, updates: Map<String, Value>) {
        let Some(cache) = &self.cache else { return };

        let mut merged = self.config_updates().await;
        merged.extend(updates);
        merged.insert(
            "last_update".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        if let Err(e) = cache.set(CONFIG_UPDATES_KEY, &merged).await {
            warn!(error = %e, "Failed to save config updates");
        }
    }

    /// 저장된 설정 변경분.
    pub async fn config_updates(&self) -> Map<String, Value> {
        let Some(cache) = &self.cache else {
            return Map::new();
        };
        match cache.get::<Map<String, Value>>(CONFIG_UPDATES_KEY).await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load config updates");
                Map::new()
            }
        }
    }
}
