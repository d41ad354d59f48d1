//! 조회 제한 시간과 재시도 간격.

use std::time::Duration;

use semaforo_core::{SanityBand, StreamConfig};

/// 스트림/단건 조회 타이밍 정책.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPolicy {
    /// 스트림 사이클당 소스 조회 제한 시간
    pub scrape_timeout: Duration,
    /// 실패 후 재시도까지 대기
    pub error_cooldown: Duration,
    /// 성공 후 다음 조회까지 대기
    pub poll_interval: Duration,
    /// 단건 조회 제한 시간
    pub query_timeout: Duration,
    /// SSE keep-alive 주기
    pub keep_alive: Duration,
    /// 롱+숏 합계 허용 범위
    pub sanity_band: SanityBand,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        Self::from_settings(&StreamConfig::default())
    }
}

impl StreamPolicy {
    pub fn from_settings(settings: &StreamConfig) -> Self {
        Self {
            scrape_timeout: settings.scrape_timeout(),
            error_cooldown: settings.error_cooldown(),
            poll_interval: settings.poll_interval(),
            query_timeout: settings.query_timeout(),
            keep_alive: settings.keep_alive(),
            sanity_band: settings.sanity_band(),
        }
    }

    /// 사이클 결과에 따른 다음 조회까지의 대기 시간.
    pub fn delay_after(&self, succeeded: bool) -> Duration {
        if succeeded {
            self.poll_interval
        } else {
            self.error_cooldown
        }
    }
}
