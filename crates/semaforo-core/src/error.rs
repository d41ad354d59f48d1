//! 비율 스트림 및 단건 조회의 에러 타입.
//!
//! 스트림 세션에서는 사이클 단위 실패가 `error` 이벤트로 흡수되고,
//! 단건 조회에서는 호출자에게 그대로 전파됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 비율 소스 관련 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StreamError {
    /// 소스 호출이 제한 시간을 초과함
    #[error("Timeout fetching {symbol} ({secs}s)", secs = .timeout.as_secs())]
    SourceTimeout {
        /// 대상 심볼
        symbol: String,
        /// 적용된 제한 시간
        timeout: Duration,
    },

    /// 전송/파싱 실패
    #[error("Source error: {0}")]
    SourceUnavailable(String),

    /// sanity band를 벗어났거나 데이터가 없음
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// 세션 또는 레지스트리 초기화 실패 (해당 세션만 종료)
    #[error("Setup failure: {0}")]
    SetupFailure(String),
}

impl StreamError {
    /// 에러 종류 태그를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::SourceTimeout { .. } => ErrorKind::Timeout,
            StreamError::SourceUnavailable(_) => ErrorKind::Unavailable,
            StreamError::InvalidSample(_) => ErrorKind::InvalidSample,
            StreamError::SetupFailure(_) => ErrorKind::SetupFailure,
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 세션 초기화 실패를 제외한 모든 소스 에러는 쿨다운 후 재시도됩니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StreamError::SetupFailure(_))
    }

    /// 데이터 없음 에러 생성.
    pub fn no_data(symbol: impl fmt::Display) -> Self {
        StreamError::InvalidSample(format!("No data for {}", symbol))
    }
}

/// `error` 이벤트에 실리는 에러 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 제한 시간 초과
    Timeout,
    /// 소스 사용 불가
    Unavailable,
    /// 유효하지 않은 샘플
    InvalidSample,
    /// 초기화 실패
    SetupFailure,
}

impl ErrorKind {
    /// 메트릭/로그용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::InvalidSample => "invalid_sample",
            ErrorKind::SetupFailure => "setup_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 비율 조회 Result 타입.
pub type StreamResult<T> = Result<T, StreamError>;
