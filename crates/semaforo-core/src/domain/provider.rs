//! 외부 데이터 소스 추상화.
//!
//! 비율 소스와 선물 시장 데이터 제공자에 대한 거래소 중립 인터페이스를 정의합니다.

use async_trait::async_trait;
use thiserror::Error;

use super::market_data::{Candle, FundingRate, LiquidationEstimate, OpenInterest, Ticker};
use super::ratio::RatioReading;
use crate::error::StreamResult;
use crate::types::{Symbol, Timeframe};

// =============================================================================
// 에러 타입
// =============================================================================

/// MarketDataProvider 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 시간 초과
    #[error("Request timed out")]
    Timeout,

    /// API 에러
    #[error("API error: {0}")]
    Api(String),

    /// 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 지원하지 않는 심볼
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

// =============================================================================
// RatioSource Trait
// =============================================================================

/// 롱/숏 비율 소스.
///
/// 느리고 가끔 응답하지 않는 외부 소스로 취급합니다. 호출자가 제한 시간을
/// 적용하며, 구현은 반환(성공/실패) 이후 백그라운드 작업을 남기지 않아야 합니다.
#[async_trait]
pub trait RatioSource: Send + Sync {
    /// 소스 이름 (로깅용).
    fn name(&self) -> &str;

    /// 심볼의 롱/숏 백분율을 조회합니다.
    ///
    /// # Errors
    ///
    /// - `StreamError::SourceUnavailable`: 전송 또는 파싱 실패
    /// - `StreamError::InvalidSample`: 데이터 없음
    async fn fetch(&self, symbol: &Symbol) -> StreamResult<RatioReading>;
}

// =============================================================================
// MarketDataProvider Trait
// =============================================================================

/// 선물 시장 데이터 제공자.
///
/// 리스크 집계기가 펀딩비, 미결제약정, 시세, 캔들, 청산 추정을 조회할 때 사용합니다.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름.
    fn name(&self) -> &str;

    /// 연결 상태 확인. 기본 구현은 항상 성공합니다.
    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// 펀딩비 조회.
    async fn funding_rate(&self, symbol: &Symbol) -> Result<FundingRate, ProviderError>;

    /// 미결제약정 및 24시간 변화 조회.
    async fn open_interest(&self, symbol: &Symbol) -> Result<OpenInterest, ProviderError>;

    /// 현재 시세 조회.
    async fn ticker(&self, symbol: &Symbol) -> Result<Ticker, ProviderError>;

    /// 최근 캔들 조회 (오래된 순).
    async fn klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError>;

    /// 청산 가격 및 규모 추정.
    async fn liquidation_estimate(
        &self,
        symbol: &Symbol,
    ) -> Result<LiquidationEstimate, ProviderError>;
}
