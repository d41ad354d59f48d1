//! Binance USDⓈ-M 선물 시장 데이터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 공개 REST 커넥터 (`BinanceFuturesClient`)
//! - `MarketDataProvider` 구현 (펀딩비, 미결제약정, 시세, 캔들, 청산 추정)
//! - `RatioSource` 구현 (계정 비율, 호가창 근사, 폴백 체인)

pub mod connector;
pub mod error;
pub mod provider;
pub mod source;

pub use connector::{BinanceFuturesClient, BinanceFuturesConfig};
pub use error::*;
pub use provider::BinanceMarketData;
pub use source::{AccountRatioSource, FallbackRatioSource, OrderBookRatioSource};
