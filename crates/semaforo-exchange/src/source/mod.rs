//! 롱/숏 비율 소스 구현.

mod binance;
mod fallback;

pub use binance::{AccountRatioSource, OrderBookRatioSource};
pub use fallback::FallbackRatioSource;
