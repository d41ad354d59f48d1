//! 스트림 세션 이벤트.
//!
//! 한 세션 안에서 이벤트는 단일 생산자가 순서대로 방출합니다:
//! `connected` 1회, 이후 사이클마다 `loading` 다음에 `update` 또는 `error`.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::ratio::RatioSample;
use crate::error::{ErrorKind, StreamError};
use crate::types::Symbol;

/// SSE로 전송되는 태그된 스트림 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// 세션 시작
    Connected {
        symbol: Symbol,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// 소스 조회 시작
    Loading {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
    },
    /// 검증된 샘플
    Update(RatioSample),
    /// 사이클 실패
    Error {
        symbol: Symbol,
        kind: ErrorKind,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    /// `connected` 이벤트 생성.
    pub fn connected(symbol: &Symbol) -> Self {
        StreamEvent::Connected {
            symbol: symbol.clone(),
            message: format!("Starting long/short feed for {}", symbol),
            timestamp: Utc::now(),
        }
    }

    /// `loading` 이벤트 생성.
    pub fn loading(symbol: &Symbol) -> Self {
        StreamEvent::Loading {
            symbol: symbol.clone(),
            timestamp: Utc::now(),
        }
    }

    /// `error` 이벤트 생성.
    pub fn error(symbol: &Symbol, err: &StreamError) -> Self {
        StreamEvent::Error {
            symbol: symbol.clone(),
            kind: err.kind(),
            message: err.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// SSE 이벤트 이름.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Loading { .. } => "loading",
            StreamEvent::Update(_) => "update",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// 이벤트 대상 심볼.
    pub fn symbol(&self) -> &Symbol {
        match self {
            StreamEvent::Connected { symbol, .. }
            | StreamEvent::Loading { symbol, .. }
            | StreamEvent::Error { symbol, .. } => symbol,
            StreamEvent::Update(sample) => &sample.symbol,
        }
    }

    /// 방출 시각.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            StreamEvent::Connected { timestamp, .. }
            | StreamEvent::Loading { timestamp, .. }
            | StreamEvent::Error { timestamp, .. } => *timestamp,
            StreamEvent::Update(sample) => sample.timestamp,
        }
    }

    /// 에러 이벤트라면 그 종류.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            StreamEvent::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// SSE `data:` 필드에 실릴 JSON 본문.
    pub fn payload(&self) -> Value {
        match self {
            StreamEvent::Connected {
                symbol,
                message,
                timestamp,
            } => json!({
                "symbol": symbol,
                "status": "connected",
                "message": message,
                "timestamp": timestamp.to_rfc3339(),
            }),
            StreamEvent::Loading { symbol, timestamp } => json!({
                "symbol": symbol,
                "status": "scraping",
                "timestamp": timestamp.to_rfc3339(),
            }),
            StreamEvent::Update(sample) => json!({
                "symbol": sample.symbol,
                "longRatio": sample.long_percent,
                "shortRatio": sample.short_percent,
                "ratio": sample.ratio,
                "timestamp": sample.timestamp.to_rfc3339(),
                "source": sample.source,
            }),
            StreamEvent::Error {
                symbol,
                kind,
                message,
                timestamp,
            } => json!({
                "symbol": symbol,
                "error": message,
                "kind": kind,
                "timestamp": timestamp.to_rfc3339(),
            }),
        }
    }
}
