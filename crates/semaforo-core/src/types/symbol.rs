//! 자산 심볼 정의.
//!
//! `Symbol`은 레지스트리와 비율 조회의 식별 키입니다.
//! 정규화는 공백 제거와 대문자 변환뿐이며, 알 수 없는 심볼도 그대로 소스에 전달됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 기본 호가 자산 (선물 마켓 심볼 생성용).
pub const DEFAULT_QUOTE: &str = "USDT";

/// 대문자 자산 티커 (예: "BTC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Symbol(String);

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(ticker: impl AsRef<str>) -> Self {
        Self(ticker.as_ref().trim().to_uppercase())
    }

    /// 티커 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// USDT 마진 선물 마켓 심볼로 변환합니다 (예: BTC → BTCUSDT).
    ///
    /// 이미 호가 자산으로 끝나는 티커는 그대로 반환합니다.
    pub fn to_market_symbol(&self) -> String {
        if self.0.ends_with(DEFAULT_QUOTE) && self.0.len() > DEFAULT_QUOTE.len() {
            self.0.clone()
        } else {
            format!("{}{}", self.0, DEFAULT_QUOTE)
        }
    }

    /// 빈 심볼 여부.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = Self::new(s);
        if symbol.is_empty() {
            Err("Empty symbol".to_string())
        } else {
            Ok(symbol)
        }
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_uppercases() {
        assert_eq!(Symbol::new(" btc ").as_str(), "BTC");
        assert_eq!(Symbol::from("eth"), Symbol::new("ETH"));
    }

    #[test]
    fn test_market_symbol() {
        assert_eq!(Symbol::new("BTC").to_market_symbol(), "BTCUSDT");
        assert_eq!(Symbol::new("solusdt").to_market_symbol(), "SOLUSDT");
        // "USDT" 자체는 기준 자산으로 취급
        assert_eq!(Symbol::new("USDT").to_market_symbol(), "USDTUSDT");
    }

    #[test]
    fn test_symbol_parse_rejects_empty() {
        assert!("  ".parse::<Symbol>().is_err());
        assert_eq!("doge".parse::<Symbol>().unwrap().as_str(), "DOGE");
    }
}
