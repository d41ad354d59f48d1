//! Binance USDⓈ-M 선물 커넥터.
//!
//! 인증이 필요 없는 공개 REST 엔드포인트만 사용합니다:
//! 롱/숏 계정 비율, 펀딩비, 미결제약정, 시세, 호가창, 캔들.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use semaforo_core::{Candle, ExchangeConfig, Symbol, Timeframe};

use crate::error::{ExchangeError, ExchangeResult};

// ============================================================================
// 설정
// ============================================================================

/// Binance 선물 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct BinanceFuturesConfig {
    /// REST 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BinanceFuturesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fapi.binance.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl BinanceFuturesConfig {
    /// 지정한 기본 URL로 생성 (mockito 서버).
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// 애플리케이션 설정에서 생성.
    pub fn from_settings(settings: &ExchangeConfig) -> Self {
        Self {
            base_url: settings.futures_base_url.trim_end_matches('/').to_string(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountRatioEntry {
    pub long_account: String,
    pub short_account: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PremiumIndex {
    pub mark_price: String,
    pub last_funding_rate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FundingRateEntry {
    pub funding_rate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInterestSnapshot {
    pub open_interest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInterestHistEntry {
    pub sum_open_interest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Ticker24h {
    pub last_price: String,
    pub quote_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookTicker {
    pub bid_price: String,
    pub ask_price: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Depth {
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // 응답 배열 전체 매핑
struct BinanceKline(
    i64,               // 0: Open time
    String,            // 1: Open
    String,            // 2: High
    String,            // 3: Low
    String,            // 4: Close
    String,            // 5: Volume
    i64,               // 6: Close time
    String,            // 7: Quote asset volume
    i64,               // 8: Number of trades
    String,            // 9: Taker buy base asset volume
    String,            // 10: Taker buy quote asset volume
    serde_json::Value, // 11: Ignore
);

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// 클라이언트
// ============================================================================

/// Binance 선물 공개 API 클라이언트.
#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    config: BinanceFuturesConfig,
    client: Client,
}

impl BinanceFuturesClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceFuturesConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 기본 URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let query = Self::build_query(params);
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let response = self.client.get(&full_url).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(ExchangeError::RateLimited);
        }

        match serde_json::from_str::<BinanceError>(&body) {
            Ok(err) => Err(Self::map_error_code(err.code, &err.msg)),
            Err(_) => Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            }),
        }
    }

    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1003 => ExchangeError::RateLimited,
            -1121 => ExchangeError::SymbolNotFound(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    // ========================================================================
    // 엔드포인트
    // ========================================================================

    /// 연결 확인 (`/fapi/v1/ping`).
    pub async fn ping(&self) -> ExchangeResult<()> {
        let _: serde_json::Value = self.public_get("/fapi/v1/ping", &[]).await?;
        Ok(())
    }

    /// 최신 글로벌 롱/숏 계정 비율을 백분율로 조회합니다.
    ///
    /// 반환값은 `(long_percent, short_percent, 측정 시각)`입니다.
    pub async fn account_long_short_ratio(
        &self,
        symbol: &Symbol,
        period: Timeframe,
    ) -> ExchangeResult<(f64, f64, DateTime<Utc>)> {
        let entries: Vec<AccountRatioEntry> = self
            .public_get(
                "/futures/data/globalLongShortAccountRatio",
                &[
                    ("symbol", symbol.to_market_symbol()),
                    ("period", period.to_binance_interval().to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let latest = entries
            .last()
            .ok_or_else(|| ExchangeError::EmptyResponse(symbol.to_string()))?;

        let long = parse_f64(&latest.long_account)? * 100.0;
        let short = parse_f64(&latest.short_account)? * 100.0;
        let at = DateTime::from_timestamp_millis(latest.timestamp).unwrap_or_else(Utc::now);

        Ok((long, short, at))
    }

    /// 호가창 누적 수량 `(bid_volume, ask_volume)`.
    pub async fn order_book_volumes(
        &self,
        symbol: &Symbol,
        limit: u32,
    ) -> ExchangeResult<(Decimal, Decimal)> {
        let depth: Depth = self
            .public_get(
                "/fapi/v1/depth",
                &[
                    ("symbol", symbol.to_market_symbol()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let sum = |levels: &[[String; 2]]| -> ExchangeResult<Decimal> {
            levels
                .iter()
                .map(|[_, qty]| parse_decimal(qty))
                .sum::<ExchangeResult<Decimal>>()
        };

        Ok((sum(&depth.bids)?, sum(&depth.asks)?))
    }

    pub(crate) async fn premium_index(&self, symbol: &Symbol) -> ExchangeResult<PremiumIndex> {
        self.public_get(
            "/fapi/v1/premiumIndex",
            &[("symbol", symbol.to_market_symbol())],
        )
        .await
    }

    pub(crate) async fn funding_history(
        &self,
        symbol: &Symbol,
        limit: u32,
    ) -> ExchangeResult<Vec<FundingRateEntry>> {
        self.public_get(
            "/fapi/v1/fundingRate",
            &[
                ("symbol", symbol.to_market_symbol()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub(crate) async fn open_interest_snapshot(
        &self,
        symbol: &Symbol,
    ) -> ExchangeResult<OpenInterestSnapshot> {
        self.public_get(
            "/fapi/v1/openInterest",
            &[("symbol", symbol.to_market_symbol())],
        )
        .await
    }

    pub(crate) async fn open_interest_history(
        &self,
        symbol: &Symbol,
        period: Timeframe,
        limit: u32,
    ) -> ExchangeResult<Vec<OpenInterestHistEntry>> {
        self.public_get(
            "/futures/data/openInterestHist",
            &[
                ("symbol", symbol.to_market_symbol()),
                ("period", period.to_binance_interval().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub(crate) async fn ticker_24h(&self, symbol: &Symbol) -> ExchangeResult<Ticker24h> {
        self.public_get(
            "/fapi/v1/ticker/24hr",
            &[("symbol", symbol.to_market_symbol())],
        )
        .await
    }

    pub(crate) async fn book_ticker(&self, symbol: &Symbol) -> ExchangeResult<BookTicker> {
        self.public_get(
            "/fapi/v1/ticker/bookTicker",
            &[("symbol", symbol.to_market_symbol())],
        )
        .await
    }

    /// 캔들 조회 (오래된 순).
    pub async fn klines(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        let resp: Vec<BinanceKline> = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_market_symbol()),
                    ("interval", timeframe.to_binance_interval().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        resp.into_iter()
            .map(|k| {
                Ok(Candle {
                    timeframe,
                    open_time: DateTime::from_timestamp_millis(k.0).unwrap_or_else(Utc::now),
                    open: parse_decimal(&k.1)?,
                    high: parse_decimal(&k.2)?,
                    low: parse_decimal(&k.3)?,
                    close: parse_decimal(&k.4)?,
                    volume: parse_decimal(&k.5)?,
                })
            })
            .collect()
    }
}

/// 문자열 숫자를 f64로 파싱.
pub(crate) fn parse_f64(s: &str) -> ExchangeResult<f64> {
    s.parse()
        .map_err(|_| ExchangeError::ParseError(format!("invalid number: {}", s)))
}

/// 문자열 숫자를 Decimal로 파싱.
pub(crate) fn parse_decimal(s: &str) -> ExchangeResult<Decimal> {
    s.parse()
        .map_err(|_| ExchangeError::ParseError(format!("invalid decimal: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn client_for(server: &mockito::ServerGuard) -> BinanceFuturesClient {
        BinanceFuturesClient::new(BinanceFuturesConfig::with_base_url(server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_account_ratio_to_percent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/futures/data/globalLongShortAccountRatio")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("period".into(), "5m".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"symbol":"BTCUSDT","longShortRatio":"1.7397","longAccount":"0.6350","shortAccount":"0.3650","timestamp":1700000000000}]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let (long, short, _) = client
            .account_long_short_ratio(&Symbol::new("btc"), Timeframe::M5)
            .await
            .unwrap();

        assert!((long - 63.5).abs() < 1e-9);
        assert!((short - 36.5).abs() < 1e-9);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_ratio_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/futures/data/globalLongShortAccountRatio")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .account_long_short_ratio(&Symbol::new("BTC"), Timeframe::M5)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_error_code_mapping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/premiumIndex")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.premium_index(&Symbol::new("NOPE")).await.unwrap_err();
        assert!(matches!(err, ExchangeError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ping")
            .with_status(429)
            .with_body("")
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.ping().await.unwrap_err(),
            ExchangeError::RateLimited
        ));
    }

    #[tokio::test]
    async fn test_order_book_volumes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/depth")
            .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
            .with_status(200)
            .with_body(
                r#"{"lastUpdateId":1,"E":1,"T":1,"bids":[["100.0","1.5"],["99.9","2.5"]],"asks":[["100.1","1.0"]]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let (bids, asks) = client
            .order_book_volumes(&Symbol::new("ETH"), 100)
            .await
            .unwrap();
        assert_eq!(bids, dec!(4.0));
        assert_eq!(asks, dec!(1.0));
    }

    #[tokio::test]
    async fn test_klines_parse() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/klines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[[1700000000000,"100","110","90","105","12.5",1700003599999,"1300",42,"6","650","0"]]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let candles = client
            .klines(&Symbol::new("SOL"), Timeframe::H1, 1)
            .await
            .unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].high, dec!(110));
        assert_eq!(candles[0].close, dec!(105));
        assert_eq!(candles[0].timeframe, Timeframe::H1);
    }
}
