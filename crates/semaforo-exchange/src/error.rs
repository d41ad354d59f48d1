//! 거래소 에러 타입.

use semaforo_core::{ProviderError, StreamError};
use thiserror::Error;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 응답에 데이터가 없음
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_) | ExchangeError::RateLimited | ExchangeError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

// HTTP 계층 타임아웃은 세션 타임아웃(SourceTimeout)과 구분되어 SourceUnavailable이 됩니다.
impl From<ExchangeError> for StreamError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::EmptyResponse(symbol) => StreamError::no_data(symbol),
            other => StreamError::SourceUnavailable(other.to_string()),
        }
    }
}

impl From<ExchangeError> for ProviderError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::NetworkError(msg) => ProviderError::Network(msg),
            ExchangeError::Timeout(_) => ProviderError::Timeout,
            ExchangeError::ParseError(msg) => ProviderError::Parse(msg),
            ExchangeError::SymbolNotFound(symbol) => ProviderError::UnknownSymbol(symbol),
            other => ProviderError::Api(other.to_string()),
        }
    }
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
