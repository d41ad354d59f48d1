//! Binance 선물 기반 비율 소스.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use semaforo_core::{RatioReading, RatioSource, StreamResult, Symbol, Timeframe};

use crate::connector::binance_futures::BinanceFuturesClient;

/// 글로벌 롱/숏 계정 비율 소스 (`source = "binance_api"`).
pub struct AccountRatioSource {
    client: Arc<BinanceFuturesClient>,
    period: Timeframe,
}

impl AccountRatioSource {
    pub const SOURCE_TAG: &'static str = "binance_api";

    /// 5분 주기 비율을 사용하는 소스 생성.
    pub fn new(client: Arc<BinanceFuturesClient>) -> Self {
        Self {
            client,
            period: Timeframe::M5,
        }
    }
}

#[async_trait]
impl RatioSource for AccountRatioSource {
    fn name(&self) -> &str {
        Self::SOURCE_TAG
    }

    async fn fetch(&self, symbol: &Symbol) -> StreamResult<RatioReading> {
        let (long, short, at) = self
            .client
            .account_long_short_ratio(symbol, self.period)
            .await?;
        debug!(symbol = %symbol, long, short, measured_at = %at, "Account ratio fetched");

        Ok(RatioReading::new(long, short, Self::SOURCE_TAG))
    }
}

/// 호가창 매수/매도 잔량 근사 소스 (`source = "orderbook_approximation"`).
///
/// 실제 포지션이 아닌 호가 불균형이므로 계정 비율을 쓸 수 없을 때만 사용합니다.
pub struct OrderBookRatioSource {
    client: Arc<BinanceFuturesClient>,
    depth: u32,
}

impl OrderBookRatioSource {
    pub const SOURCE_TAG: &'static str = "orderbook_approximation";

    /// 100 레벨 깊이로 생성.
    pub fn new(client: Arc<BinanceFuturesClient>) -> Self {
        Self { client, depth: 100 }
    }
}

/// 매수/매도 잔량을 롱/숏 백분율로 변환합니다. 매도 잔량이 0이면 50/50.
pub(crate) fn volumes_to_percent(bid_volume: Decimal, ask_volume: Decimal) -> (f64, f64) {
    let ratio = if ask_volume > Decimal::ZERO {
        (bid_volume / ask_volume).to_f64().unwrap_or(1.0)
    } else {
        1.0
    };
    let long = ratio / (ratio + 1.0) * 100.0;
    let short = 1.0 / (ratio + 1.0) * 100.0;
    (long, short)
}

#[async_trait]
impl RatioSource for OrderBookRatioSource {
    fn name(&self) -> &str {
        Self::SOURCE_TAG
    }

    async fn fetch(&self, symbol: &Symbol) -> StreamResult<RatioReading> {
        let (bids, asks) = self.client.order_book_volumes(symbol, self.depth).await?;
        let (long, short) = volumes_to_percent(bids, asks);

        Ok(RatioReading::new(long, short, Self::SOURCE_TAG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::binance_futures::BinanceFuturesConfig;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use semaforo_core::ErrorKind;

    #[test]
    fn test_volumes_to_percent() {
        let (long, short) = volumes_to_percent(dec!(3), dec!(1));
        assert!((long - 75.0).abs() < 1e-9);
        assert!((short - 25.0).abs() < 1e-9);

        assert_eq!(volumes_to_percent(dec!(5), Decimal::ZERO), (50.0, 50.0));
    }

    #[tokio::test]
    async fn test_account_source_tag() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/futures/data/globalLongShortAccountRatio")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"longAccount":"0.5","shortAccount":"0.5","timestamp":1700000000000}]"#)
            .create_async()
            .await;

        let client =
            BinanceFuturesClient::new(BinanceFuturesConfig::with_base_url(server.url())).unwrap();
        let source = AccountRatioSource::new(Arc::new(client));
        let reading = source.fetch(&Symbol::new("BTC")).await.unwrap();

        assert_eq!(reading.source, "binance_api");
        assert_eq!(reading.long_percent, 50.0);
    }

    #[tokio::test]
    async fn test_account_source_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/futures/data/globalLongShortAccountRatio")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client =
            BinanceFuturesClient::new(BinanceFuturesConfig::with_base_url(server.url())).unwrap();
        let err = AccountRatioSource::new(Arc::new(client))
            .fetch(&Symbol::new("BTC"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
