//! 거래소 REST 커넥터.

pub mod binance_futures;

pub use binance_futures::{BinanceFuturesClient, BinanceFuturesConfig};
