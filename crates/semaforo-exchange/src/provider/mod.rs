//! MarketDataProvider 구현체.

mod binance;

pub use binance::BinanceMarketData;
