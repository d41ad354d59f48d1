//! 설정 관리.
//!
//! 기본값 → `config/default.toml`(선택) → `SEMAFORO__SECTION__KEY` 환경 변수 순으로
//! 병합합니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::SanityBand;
use crate::logging::LogFormat;
use crate::types::Symbol;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 비율 스트림 타이밍 정책
    #[serde(default)]
    pub stream: StreamConfig,
    /// 거래소 설정
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Redis 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// 트레이딩 파라미터
    #[serde(default)]
    pub trading: TradingConfig,
    /// 트레이드 메모리 TTL
    #[serde(default)]
    pub memory: MemoryConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    #[serde(default = "default_host")]
    pub host: String,
    /// 리스닝할 포트
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 비율 스트림 타이밍 및 검증 정책.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// 스트림 사이클당 소스 조회 제한 시간 (초)
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,
    /// 실패 후 재시도 전 대기 (초)
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_secs: u64,
    /// 정상 사이클 간 대기 (초)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// 단건 조회 제한 시간 (초)
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// 롱+숏 합계 최소값
    #[serde(default = "default_sanity_min")]
    pub sanity_min: f64,
    /// 롱+숏 합계 최대값
    #[serde(default = "default_sanity_max")]
    pub sanity_max: f64,
    /// SSE keep-alive 주기 (초)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_scrape_timeout() -> u64 {
    30
}
fn default_error_cooldown() -> u64 {
    5
}
fn default_poll_interval() -> u64 {
    2
}
fn default_query_timeout() -> u64 {
    10
}
fn default_sanity_min() -> f64 {
    95.0
}
fn default_sanity_max() -> f64 {
    105.0
}
fn default_keep_alive() -> u64 {
    15
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            scrape_timeout_secs: default_scrape_timeout(),
            error_cooldown_secs: default_error_cooldown(),
            poll_interval_secs: default_poll_interval(),
            query_timeout_secs: default_query_timeout(),
            sanity_min: default_sanity_min(),
            sanity_max: default_sanity_max(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl StreamConfig {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn sanity_band(&self) -> SanityBand {
        SanityBand::new(self.sanity_min, self.sanity_max)
    }
}

/// 거래소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// USDⓈ-M 선물 REST 기본 URL
    #[serde(default = "default_futures_url")]
    pub futures_base_url: String,
    /// HTTP 요청 타임아웃 (초)
    #[serde(default = "default_exchange_timeout")]
    pub timeout_secs: u64,
    /// 계정 비율 API 실패 시 호가창 근사로 대체할지 여부
    #[serde(default = "default_true")]
    pub orderbook_fallback: bool,
}

fn default_futures_url() -> String {
    "https://fapi.binance.com".to_string()
}
fn default_exchange_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            futures_base_url: default_futures_url(),
            timeout_secs: default_exchange_timeout(),
            orderbook_fallback: true,
        }
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedisConfig {
    /// 연결 URL. 없으면 메모리 없이(degraded) 동작합니다.
    #[serde(default)]
    pub url: Option<String>,
}

/// 트레이딩 파라미터.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// 분석 대상 자산
    #[serde(default = "default_assets")]
    pub assets: Vec<Symbol>,
    /// 기본 손절 비율 (%)
    #[serde(default = "default_stoploss")]
    pub stoploss_percent: f64,
    /// 기본 익절 비율 (%)
    #[serde(default = "default_takeprofit")]
    pub takeprofit_percent: f64,
    /// 최소 손익비
    #[serde(default = "default_min_rr")]
    pub min_risk_reward: f64,
    /// 동시 활성 트레이드 최대 수
    #[serde(default = "default_max_trades")]
    pub max_concurrent_trades: usize,
    /// 진입 계산에 사용할 캔들 수
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
}

fn default_assets() -> Vec<Symbol> {
    vec![Symbol::new("BTC"), Symbol::new("ETH"), Symbol::new("SOL")]
}
fn default_stoploss() -> f64 {
    2.0
}
fn default_takeprofit() -> f64 {
    4.0
}
fn default_min_rr() -> f64 {
    1.5
}
fn default_max_trades() -> usize {
    3
}
fn default_candle_limit() -> usize {
    100
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            stoploss_percent: default_stoploss(),
            takeprofit_percent: default_takeprofit(),
            min_risk_reward: default_min_rr(),
            max_concurrent_trades: default_max_trades(),
            candle_limit: default_candle_limit(),
        }
    }
}

impl TradingConfig {
    /// 설정된 자산인지 확인합니다.
    pub fn is_configured(&self, symbol: &Symbol) -> bool {
        self.assets.iter().any(|a| a == symbol)
    }
}

/// 트레이드 메모리 보존 기간.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// 분석 결과 캐시 (분)
    #[serde(default = "default_analysis_cache")]
    pub analysis_cache_minutes: u64,
    /// 트레이드 이력 보존 (일)
    #[serde(default = "default_history_days")]
    pub trade_history_days: u64,
    /// 확인 대기 트레이드 보존 (초)
    #[serde(default = "default_pending_ttl")]
    pub pending_trade_ttl_secs: u64,
}

fn default_analysis_cache() -> u64 {
    15
}
fn default_history_days() -> u64 {
    30
}
fn default_pending_ttl() -> u64 {
    3600
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            analysis_cache_minutes: default_analysis_cache(),
            trade_history_days: default_history_days(),
            pending_trade_ttl_secs: default_pending_ttl(),
        }
    }
}

impl MemoryConfig {
    pub fn analysis_ttl_secs(&self) -> u64 {
        self.analysis_cache_minutes * 60
    }

    pub fn history_ttl_secs(&self) -> u64 {
        self.trade_history_days * 24 * 60 * 60
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 필터 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 출력 형식
    #[serde(default)]
    pub format: LogFormat,
    /// span 종료 이벤트 기록
    #[serde(default)]
    pub span_events: bool,
    /// 파일/줄 번호 포함
    #[serde(default)]
    pub with_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            span_events: false,
            with_file: false,
        }
    }
}

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 설정 파일(선택)과 `SEMAFORO__SECTION__KEY` 환경 변수를 병합한 원본 설정.
///
/// 다른 크레이트가 자기 섹션(예: `[risk]`)을 같은 원본에서 읽을 수 있도록 분리되어 있습니다.
pub fn load_sources<P: AsRef<Path>>(path: P) -> Result<config::Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path.as_ref()).required(false))
        .add_source(
            config::Environment::with_prefix("SEMAFORO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
}

impl AppConfig {
    /// 병합된 원본에서 설정을 읽고 검증합니다.
    pub fn from_sources(sources: &config::Config) -> Result<Self, config::ConfigError> {
        let config: AppConfig = sources.clone().try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 값 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let s = &self.stream;
        if s.scrape_timeout_secs == 0 || s.query_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "stream timeouts must be greater than zero".into(),
            ));
        }
        if s.error_cooldown_secs == 0 || s.poll_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "stream.error_cooldown_secs and stream.poll_interval_secs must be greater than zero"
                    .into(),
            ));
        }
        if s.error_cooldown_secs < s.poll_interval_secs {
            return Err(config::ConfigError::Message(format!(
                "stream.error_cooldown_secs ({}) must not be shorter than stream.poll_interval_secs ({})",
                s.error_cooldown_secs, s.poll_interval_secs
            )));
        }
        if s.sanity_min >= s.sanity_max {
            return Err(config::ConfigError::Message(format!(
                "stream.sanity_min ({}) must be below stream.sanity_max ({})",
                s.sanity_min, s.sanity_max
            )));
        }
        if self.trading.assets.is_empty() {
            return Err(config::ConfigError::Message(
                "trading.assets must not be empty".into(),
            ));
        }
        if self.trading.stoploss_percent <= 0.0 || self.trading.takeprofit_percent <= 0.0 {
            return Err(config::ConfigError::Message(
                "trading stop-loss and take-profit must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.scrape_timeout(), Duration::from_secs(30));
        assert_eq!(config.error_cooldown(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        assert_eq!(config.sanity_band(), SanityBand::default());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let json = r#"{"stream": {"poll_interval_secs": 3}, "trading": {"assets": ["btc"]}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.stream.poll_interval_secs, 3);
        assert_eq!(config.stream.scrape_timeout_secs, 30);
        assert_eq!(config.trading.assets, vec![Symbol::new("BTC")]);
        assert_eq!(config.trading.max_concurrent_trades, 3);
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.stream.sanity_min = 110.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cooldown() {
        let mut config = AppConfig::default();
        config.stream.error_cooldown_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.stream.poll_interval_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_cooldown_shorter_than_poll() {
        let mut config = AppConfig::default();
        config.stream.error_cooldown_secs = 1;
        config.stream.poll_interval_secs = 2;
        assert!(config.validate().is_err());

        config.stream.error_cooldown_secs = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_are_validated() {
        let sources = config::Config::builder()
            .add_source(config::File::from_str(
                "[stream]\nerror_cooldown_secs = 0\npoll_interval_secs = 0\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        assert!(AppConfig::from_sources(&sources).is_err());
    }

    #[test]
    fn test_from_sources_ignores_foreign_sections() {
        let sources = config::Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 9000\n\n[risk]\nfunding_weight = 0.3\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config = AppConfig::from_sources(&sources).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_memory_ttls() {
        let memory = MemoryConfig::default();
        assert_eq!(memory.analysis_ttl_secs(), 900);
        assert_eq!(memory.history_ttl_secs(), 30 * 86400);
    }
}
