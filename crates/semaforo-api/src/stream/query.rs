//! 제한 시간이 걸린 단일 소스 조회.
//!
//! 스트림 세션의 각 사이클과 단건 조회가 같은 경로를 사용합니다.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use semaforo_core::{RatioSample, RatioSource, SanityBand, StreamError, StreamResult, Symbol};

use crate::metrics::{record_fetch, record_fetch_duration};

/// 소스를 한 번 조회하여 검증된 샘플을 반환합니다.
///
/// `timeout` 안에 끝나지 않으면 진행 중인 조회 future를 드롭하고
/// `StreamError::SourceTimeout`을 반환합니다.
pub async fn fetch_sample(
    source: &dyn RatioSource,
    symbol: &Symbol,
    timeout: Duration,
    band: &SanityBand,
) -> StreamResult<RatioSample> {
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, source.fetch(symbol)).await {
        Ok(Ok(reading)) => RatioSample::from_reading(symbol, reading, band),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(StreamError::SourceTimeout {
            symbol: symbol.to_string(),
            timeout,
        }),
    };

    record_fetch_duration(symbol.as_str(), started.elapsed().as_secs_f64());
    match &result {
        Ok(sample) => {
            record_fetch(symbol.as_str(), "ok");
            debug!(
                symbol = %symbol,
                source = source.name(),
                long = sample.long_percent,
                short = sample.short_percent,
                "Ratio fetched"
            );
        }
        Err(e) => {
            record_fetch(symbol.as_str(), e.kind().as_str());
            warn!(symbol = %symbol, source = source.name(), error = %e, "Ratio fetch failed");
        }
    }

    result
}
