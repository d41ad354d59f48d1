//! 테스트용 데이터 소스 스텁.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use semaforo_core::{
    Candle, FundingRate, LiquidationEstimate, MarketDataProvider, OpenInterest, ProviderError,
    RatioReading, RatioSource, StreamError, StreamResult, Symbol, Ticker, Timeframe,
};

/// 고정 응답 비율 소스.
#[derive(Debug, Clone)]
pub enum StubRatioSource {
    /// 항상 같은 백분율
    Fixed { long: f64, short: f64 },
    /// 항상 소스 에러
    Failing,
    /// 영원히 응답하지 않음
    Pending,
}

impl StubRatioSource {
    pub fn fixed(long: f64, short: f64) -> Self {
        Self::Fixed { long, short }
    }

    pub fn failing() -> Self {
        Self::Failing
    }

    pub fn pending() -> Self {
        Self::Pending
    }
}

#[async_trait]
impl RatioSource for StubRatioSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(&self, _symbol: &Symbol) -> StreamResult<RatioReading> {
        match self {
            Self::Fixed { long, short } => Ok(RatioReading::new(*long, *short, "stub")),
            Self::Failing => Err(StreamError::SourceUnavailable("stub failure".to_string())),
            Self::Pending => std::future::pending().await,
        }
    }
}

/// 고정 시세 시장 데이터.
#[derive(Debug, Clone)]
pub struct StubMarketData {
    price: Decimal,
    available: bool,
}

impl StubMarketData {
    /// 가격 100, 변동 없는 시장.
    pub fn calm() -> Self {
        Self {
            price: Decimal::from(100),
            available: true,
        }
    }

    /// 모든 조회가 실패하는 시장.
    pub fn unavailable() -> Self {
        Self {
            price: Decimal::ZERO,
            available: false,
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.available {
            Ok(())
        } else {
            Err(ProviderError::Network("stub market unavailable".to_string()))
        }
    }
}

#[async_trait]
impl MarketDataProvider for StubMarketData {
    fn name(&self) -> &str {
        "stub"
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        self.check()
    }

    async fn funding_rate(&self, _symbol: &Symbol) -> Result<FundingRate, ProviderError> {
        self.check()?;
        Ok(FundingRate::neutral())
    }

    async fn open_interest(&self, _symbol: &Symbol) -> Result<OpenInterest, ProviderError> {
        self.check()?;
        Ok(OpenInterest {
            current: 1_000_000.0,
            change_24h: 0.0,
            change_24h_percent: 0.0,
        })
    }

    async fn ticker(&self, symbol: &Symbol) -> Result<Ticker, ProviderError> {
        self.check()?;
        Ok(Ticker {
            symbol: symbol.clone(),
            last: self.price,
            bid: self.price,
            ask: self.price,
            quote_volume: Decimal::from(1_000_000),
            timestamp: Utc::now(),
        })
    }

    async fn klines(
        &self,
        _symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        self.check()?;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Ok((0..limit)
            .map(|i| Candle {
                timeframe,
                open_time: start + Duration::hours(i as i64),
                open: self.price,
                high: self.price,
                low: self.price,
                close: self.price,
                volume: Decimal::from(10),
            })
            .collect())
    }

    async fn liquidation_estimate(
        &self,
        _symbol: &Symbol,
    ) -> Result<LiquidationEstimate, ProviderError> {
        self.check()?;
        Ok(LiquidationEstimate {
            current_price: self.price,
            long_liquidation_price: self.price,
            short_liquidation_price: self.price,
            estimated_long_liquidations: 0.0,
            estimated_short_liquidations: 0.0,
            avg_leverage_estimate: 10.0,
            total_24h: None,
        })
    }
}
