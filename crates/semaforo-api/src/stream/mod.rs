//! 주문형 롱/숏 비율 스트리밍.
//!
//! 소비자가 연결되어 있는 심볼만 조회합니다. 미리 불러오기나 백그라운드 수집은 없습니다.
//!
//! # 구성
//!
//! - [`SymbolRegistry`]: 심볼별 구독자 집합
//! - [`StreamSession`]: 소비자 1명당 조회 루프
//! - [`StreamPolicy`]: 제한 시간과 재시도 간격
//! - [`LongShortService`]: 세션 생성, 단건 조회, 현황 조회 진입점
//!
//! 세션은 소비자마다 독립적인 조회 루프를 가집니다. 같은 심볼에 N명이 연결되면
//! 소스도 N번 조회됩니다.

mod policy;
mod query;
mod registry;
mod session;

pub use policy::StreamPolicy;
pub use query::fetch_sample;
pub use registry::{ClientHandle, RegistryGuard, RegistrySnapshot, SymbolRegistry};
pub use session::StreamSession;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use semaforo_core::{RatioSample, RatioSource, StreamError, StreamResult, Symbol};

/// 롱/숏 비율 서비스.
pub struct LongShortService {
    source: Arc<dyn RatioSource>,
    registry: Arc<SymbolRegistry>,
    policy: StreamPolicy,
    shutdown: CancellationToken,
}

impl LongShortService {
    pub fn new(source: Arc<dyn RatioSource>, policy: StreamPolicy) -> Self {
        Self::with_shutdown(source, policy, CancellationToken::new())
    }

    /// 종료 토큰을 공유하는 서비스 생성. 토큰이 취소되면 모든 세션이 종료됩니다.
    pub fn with_shutdown(
        source: Arc<dyn RatioSource>,
        policy: StreamPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            registry: Arc::new(SymbolRegistry::new()),
            policy,
            shutdown,
        }
    }

    /// 새 소비자 세션을 엽니다.
    ///
    /// 레지스트리 등록은 세션의 첫 이벤트(`connected`)에서 이루어집니다.
    pub fn open(&self, symbol: Symbol) -> StreamSession {
        StreamSession::new(
            symbol,
            Arc::clone(&self.source),
            Arc::clone(&self.registry),
            self.policy.clone(),
            self.shutdown.child_token(),
        )
    }

    /// 소스를 한 번 조회합니다. 재시도와 레지스트리 등록은 없습니다.
    ///
    /// # Errors
    ///
    /// 제한 시간 초과, 소스 실패, 유효하지 않은 샘플을 그대로 전파합니다.
    pub async fn query_once(&self, symbol: &Symbol) -> StreamResult<RatioSample> {
        if symbol.is_empty() {
            return Err(StreamError::InvalidSample("Empty symbol".to_string()));
        }
        fetch_sample(
            self.source.as_ref(),
            symbol,
            self.policy.query_timeout,
            &self.policy.sanity_band,
        )
        .await
    }

    /// 레지스트리 스냅샷.
    pub fn status(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &StreamPolicy {
        &self.policy
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// 모든 세션을 종료합니다.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
