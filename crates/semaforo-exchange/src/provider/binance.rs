//! Binance 선물 MarketDataProvider 구현.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use semaforo_core::{
    close_returns_std_dev, Candle, FundingRate, LiquidationEstimate, MarketDataProvider,
    OpenInterest, ProviderError, Symbol, Ticker, Timeframe,
};

use crate::connector::binance_futures::{parse_decimal, parse_f64, BinanceFuturesClient};

/// 단기 변동성 계산 실패 시 기본값 (2%).
const DEFAULT_SHORT_VOLATILITY: f64 = 0.02;

/// Binance 선물 시장 데이터 제공자.
///
/// `BinanceFuturesClient`를 래핑하여 거래소 중립적인 인터페이스를 제공합니다.
pub struct BinanceMarketData {
    client: Arc<BinanceFuturesClient>,
}

impl BinanceMarketData {
    /// 새 제공자 생성.
    pub fn new(client: Arc<BinanceFuturesClient>) -> Self {
        Self { client }
    }

    /// 최근 24개 1시간봉 종가 수익률의 표준편차.
    async fn short_term_volatility(&self, symbol: &Symbol) -> f64 {
        match self.client.klines(symbol, Timeframe::H1, 24).await {
            Ok(candles) => close_returns_std_dev(&candles).unwrap_or(DEFAULT_SHORT_VOLATILITY),
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Volatility fallback");
                DEFAULT_SHORT_VOLATILITY
            }
        }
    }
}

/// 변동성으로 평균 레버리지를 추정합니다.
pub(crate) fn estimate_leverage(volatility: f64) -> f64 {
    if volatility < 0.03 {
        5.0
    } else {
        3.0
    }
}

#[async_trait]
impl MarketDataProvider for BinanceMarketData {
    fn name(&self) -> &str {
        "binance_futures"
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(self.client.ping().await?)
    }

    async fn funding_rate(&self, symbol: &Symbol) -> Result<FundingRate, ProviderError> {
        let index = self.client.premium_index(symbol).await?;
        let current = parse_f64(&index.last_funding_rate)?;

        let history = self.client.funding_history(symbol, 24).await?;
        let rates = history
            .iter()
            .map(|e| parse_f64(&e.funding_rate))
            .collect::<Result<Vec<_>, _>>()?;
        let avg_24h = if rates.is_empty() {
            current
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        };

        Ok(FundingRate {
            current,
            next: current,
            avg_24h,
        })
    }

    async fn open_interest(&self, symbol: &Symbol) -> Result<OpenInterest, ProviderError> {
        let snapshot = self.client.open_interest_snapshot(symbol).await?;
        let current = parse_f64(&snapshot.open_interest)?;

        // 이력 조회 실패는 변화 0으로 처리
        let history = self
            .client
            .open_interest_history(symbol, Timeframe::H1, 24)
            .await
            .unwrap_or_default();

        let (change_24h, change_24h_percent) = match history.first() {
            Some(first) if history.len() >= 2 => {
                let past = parse_f64(&first.sum_open_interest)?;
                let change = current - past;
                let pct = if past > 0.0 { change / past * 100.0 } else { 0.0 };
                (change, pct)
            }
            _ => (0.0, 0.0),
        };

        Ok(OpenInterest {
            current,
            change_24h,
            change_24h_percent,
        })
    }

    async fn ticker(&self, symbol: &Symbol) -> Result<Ticker, ProviderError> {
        let (stats, book) = futures::try_join!(
            self.client.ticker_24h(symbol),
            self.client.book_ticker(symbol)
        )?;

        Ok(Ticker {
            symbol: symbol.clone(),
            last: parse_decimal(&stats.last_price)?,
            bid: parse_decimal(&book.bid_price)?,
            ask: parse_decimal(&book.ask_price)?,
            quote_volume: parse_decimal(&stats.quote_volume)?,
            timestamp: Utc::now(),
        })
    }

    async fn klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        Ok(self.client.klines(symbol, timeframe, limit).await?)
    }

    async fn liquidation_estimate(
        &self,
        symbol: &Symbol,
    ) -> Result<LiquidationEstimate, ProviderError> {
        let index = self.client.premium_index(symbol).await?;
        let price = parse_decimal(&index.mark_price)?;
        let oi = self.open_interest(symbol).await?;

        let volatility = self.short_term_volatility(symbol).await;
        let leverage = estimate_leverage(volatility);
        let margin = Decimal::from_f64(1.0 / leverage).unwrap_or(Decimal::ZERO);

        Ok(LiquidationEstimate {
            current_price: price,
            long_liquidation_price: (price * (Decimal::ONE - margin)).round_dp(2),
            short_liquidation_price: (price * (Decimal::ONE + margin)).round_dp(2),
            estimated_long_liquidations: oi.current * 0.5,
            estimated_short_liquidations: oi.current * 0.5,
            avg_leverage_estimate: leverage,
            total_24h: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::binance_futures::BinanceFuturesConfig;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn provider_for(server: &mockito::ServerGuard) -> BinanceMarketData {
        let client =
            BinanceFuturesClient::new(BinanceFuturesConfig::with_base_url(server.url())).unwrap();
        BinanceMarketData::new(Arc::new(client))
    }

    #[test]
    fn test_estimate_leverage() {
        assert_eq!(estimate_leverage(0.01), 5.0);
        assert_eq!(estimate_leverage(0.05), 3.0);
    }

    #[tokio::test]
    async fn test_funding_rate_average() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/premiumIndex")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"symbol":"BTCUSDT","markPrice":"50000.0","lastFundingRate":"0.00010000"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/fundingRate")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"fundingRate":"0.0002"},{"fundingRate":"0.0004"}]"#)
            .create_async()
            .await;

        let funding = provider_for(&server)
            .funding_rate(&Symbol::new("BTC"))
            .await
            .unwrap();

        assert!((funding.current - 0.0001).abs() < 1e-12);
        assert_eq!(funding.next, funding.current);
        assert!((funding.avg_24h - 0.0003).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_open_interest_change() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/openInterest")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"openInterest":"110.0","symbol":"ETHUSDT","time":1}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/futures/data/openInterestHist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"sumOpenInterest":"100.0"},{"sumOpenInterest":"105.0"}]"#)
            .create_async()
            .await;

        let oi = provider_for(&server)
            .open_interest(&Symbol::new("ETH"))
            .await
            .unwrap();

        assert!((oi.change_24h - 10.0).abs() < 1e-9);
        assert!((oi.change_24h_percent - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_open_interest_without_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/openInterest")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"openInterest":"42.0"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/futures/data/openInterestHist")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let oi = provider_for(&server)
            .open_interest(&Symbol::new("SOL"))
            .await
            .unwrap();
        assert_eq!(oi.current, 42.0);
        assert_eq!(oi.change_24h_percent, 0.0);
    }

    #[tokio::test]
    async fn test_ticker_combines_book() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/24hr")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"lastPrice":"100.5","quoteVolume":"123456.7"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/ticker/bookTicker")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"bidPrice":"100.4","askPrice":"100.6"}"#)
            .create_async()
            .await;

        let ticker = provider_for(&server).ticker(&Symbol::new("BTC")).await.unwrap();
        assert_eq!(ticker.last, dec!(100.5));
        assert_eq!(ticker.bid, dec!(100.4));
        assert_eq!(ticker.ask, dec!(100.6));
    }
}
