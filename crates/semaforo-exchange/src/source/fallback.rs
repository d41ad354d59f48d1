//! 순서대로 시도하는 소스 체인.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use semaforo_core::{RatioReading, RatioSource, StreamError, StreamResult, Symbol};

/// 소스 목록을 순서대로 시도하여 첫 성공을 반환합니다.
///
/// 모두 실패하면 마지막 에러를 반환합니다.
pub struct FallbackRatioSource {
    sources: Vec<Arc<dyn RatioSource>>,
}

impl FallbackRatioSource {
    pub fn new(sources: Vec<Arc<dyn RatioSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl RatioSource for FallbackRatioSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, symbol: &Symbol) -> StreamResult<RatioReading> {
        let mut last_err = StreamError::SetupFailure("no ratio sources configured".to_string());

        for source in &self.sources {
            match source.fetch(symbol).await {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    warn!(source = source.name(), symbol = %symbol, error = %e, "Ratio source failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}
