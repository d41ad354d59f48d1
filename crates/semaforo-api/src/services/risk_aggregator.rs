//! 자산별 리스크 집계.
//!
//! 롱/숏 비율은 단건 조회 경로로만 가져오며 스트림 레지스트리에는 관여하지 않습니다.
//! 나머지 시장 지표는 병렬로 조회하고, 실패한 지표는 중립값으로 대체합니다.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use semaforo_core::{FundingRate, MarketDataProvider, OpenInterest, Symbol, Timeframe};
use semaforo_risk::{
    period_volatility, MarketSnapshot, RiskAnalysis, RiskAnalyzer, DEFAULT_VOLATILITY,
};

use crate::stream::LongShortService;

/// 변동성 계산에 쓰는 일봉 개수.
const VOLATILITY_DAYS: usize = 30;

/// 리스크 집계기.
pub struct RiskAggregator {
    longshort: Arc<LongShortService>,
    market: Arc<dyn MarketDataProvider>,
    analyzer: RiskAnalyzer,
}

impl RiskAggregator {
    pub fn new(
        longshort: Arc<LongShortService>,
        market: Arc<dyn MarketDataProvider>,
        analyzer: RiskAnalyzer,
    ) -> Self {
        Self {
            longshort,
            market,
            analyzer,
        }
    }

    /// 한 자산을 분석합니다.
    ///
    /// 롱/숏 비율 조회가 실패하면 노란불 대체 분석을 반환합니다.
    pub async fn analyze(&self, asset: &Symbol) -> RiskAnalysis {
        let snapshot = match self.snapshot(asset).await {
            Ok(snapshot) => snapshot,
            Err(message) => {
                warn!(asset = %asset, error = %message, "Risk analysis fell back to neutral");
                return RiskAnalysis::fallback(asset, message);
            }
        };

        let analysis = self.analyzer.analyze(asset, &snapshot);
        info!(
            asset = %asset,
            color = %analysis.color,
            risk_score = analysis.risk_score,
            "Asset analyzed"
        );
        analysis
    }

    /// 여러 자산을 병렬로 분석합니다. 결과 순서는 입력 순서와 같습니다.
    pub async fn analyze_many(&self, assets: &[Symbol]) -> Vec<RiskAnalysis> {
        join_all(assets.iter().map(|asset| self.analyze(asset))).await
    }

    async fn snapshot(&self, asset: &Symbol) -> Result<MarketSnapshot, String> {
        let (ratio, funding, open_interest, liquidations, daily) = tokio::join!(
            self.longshort.query_once(asset),
            self.market.funding_rate(asset),
            self.market.open_interest(asset),
            self.market.liquidation_estimate(asset),
            self.market.klines(asset, Timeframe::D1, VOLATILITY_DAYS),
        );

        let sample = ratio.map_err(|e| e.to_string())?;

        let funding = funding.unwrap_or_else(|e| {
            warn!(asset = %asset, error = %e, "Funding rate unavailable");
            FundingRate::neutral()
        });
        let open_interest = open_interest.unwrap_or_else(|e| {
            warn!(asset = %asset, error = %e, "Open interest unavailable");
            OpenInterest::default()
        });
        let liquidations = liquidations
            .map_err(|e| warn!(asset = %asset, error = %e, "Liquidation estimate unavailable"))
            .ok();
        let volatility = match daily {
            Ok(candles) => period_volatility(&candles).unwrap_or(DEFAULT_VOLATILITY),
            Err(e) => {
                warn!(asset = %asset, error = %e, "Daily candles unavailable");
                DEFAULT_VOLATILITY
            }
        };

        Ok(MarketSnapshot {
            funding,
            open_interest,
            long_short_ratio: sample.ratio,
            liquidations,
            volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamPolicy;
    use crate::testing::{StubMarketData, StubRatioSource};
    use semaforo_risk::SignalColor;

    fn aggregator(source: StubRatioSource, market: StubMarketData) -> RiskAggregator {
        let longshort = Arc::new(LongShortService::new(
            Arc::new(source),
            StreamPolicy::default(),
        ));
        RiskAggregator::new(longshort, Arc::new(market), RiskAnalyzer::default())
    }

    #[tokio::test]
    async fn test_analyze_calm_market() {
        let aggregator = aggregator(StubRatioSource::fixed(50.0, 50.0), StubMarketData::calm());

        let analysis = aggregator.analyze(&Symbol::new("BTC")).await;

        assert!(!analysis.is_fallback());
        assert_eq!(analysis.color, SignalColor::Green);
        let metrics = analysis.metrics.unwrap();
        assert_eq!(metrics.long_short_ratio.ratio, 1.0);
    }

    #[tokio::test]
    async fn test_ratio_failure_falls_back() {
        let aggregator = aggregator(StubRatioSource::failing(), StubMarketData::calm());

        let analysis = aggregator.analyze(&Symbol::new("ETH")).await;

        assert!(analysis.is_fallback());
        assert_eq!(analysis.color, SignalColor::Yellow);
        assert_eq!(analysis.risk_score, 50.0);
    }

    #[tokio::test]
    async fn test_market_failure_uses_neutral_inputs() {
        let aggregator = aggregator(
            StubRatioSource::fixed(50.0, 50.0),
            StubMarketData::unavailable(),
        );

        let analysis = aggregator.analyze(&Symbol::new("SOL")).await;

        assert!(!analysis.is_fallback());
        let metrics = analysis.metrics.unwrap();
        assert_eq!(metrics.liquidations.total_24h, 0.0);
        assert_eq!(metrics.volatility.value, DEFAULT_VOLATILITY);
    }

    #[tokio::test]
    async fn test_analyze_many_keeps_order() {
        let aggregator = aggregator(StubRatioSource::fixed(55.0, 45.0), StubMarketData::calm());
        let assets = [Symbol::new("SOL"), Symbol::new("BTC")];

        let analyses = aggregator.analyze_many(&assets).await;

        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].asset, Symbol::new("SOL"));
        assert_eq!(analyses[1].asset, Symbol::new("BTC"));
    }
}
