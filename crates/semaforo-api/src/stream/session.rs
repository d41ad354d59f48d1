//! 소비자 1명당 하나의 스트림 세션.
//!
//! 세션은 상태 기계이며, `next_event`를 호출할 때마다 다음 이벤트 하나를 만들어 냅니다.
//! 모든 대기 지점(소스 조회, 사이클 간 sleep)에서 취소 토큰을 함께 기다리므로
//! 소비자가 떠나거나 서버가 종료되면 다음 이벤트를 만들지 않고 즉시 종료됩니다.
//!
//! ```text
//! Starting ──connected──▶ Polling ──loading──▶ Fetching ──update/error──▶ Sleeping
//!                            ▲                                             │
//!                            └─────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use semaforo_core::{stream_span, RatioSource, StreamError, StreamEvent, Symbol};

use super::policy::StreamPolicy;
use super::query::fetch_sample;
use super::registry::{ClientHandle, RegistryGuard, SymbolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// 아직 `connected`를 보내지 않음
    Starting,
    /// 다음 사이클의 `loading` 차례
    Polling,
    /// 소스 조회 차례
    Fetching,
    /// 다음 사이클까지 대기
    Sleeping(Duration),
    /// 종료됨 (더 이상 이벤트 없음)
    Terminated,
}

/// 단일 소비자의 스트림 세션.
///
/// 드롭되면 진행 중인 소스 조회도 함께 드롭되고 레지스트리 등록이 해제됩니다.
pub struct StreamSession {
    symbol: Symbol,
    handle: ClientHandle,
    source: Arc<dyn RatioSource>,
    registry: Arc<SymbolRegistry>,
    policy: StreamPolicy,
    cancel: CancellationToken,
    guard: Option<RegistryGuard>,
    state: SessionState,
}

impl StreamSession {
    pub fn new(
        symbol: Symbol,
        source: Arc<dyn RatioSource>,
        registry: Arc<SymbolRegistry>,
        policy: StreamPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            symbol,
            handle: ClientHandle::new(),
            source,
            registry,
            policy,
            cancel,
            guard: None,
            state: SessionState::Starting,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    /// 세션을 취소하는 토큰 (복제본).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// 다음 이벤트를 생성합니다. 세션이 끝나면 `None`.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if self.cancel.is_cancelled() {
                self.terminate("cancelled");
                return None;
            }

            match self.state {
                SessionState::Starting => return Some(self.start()),
                SessionState::Polling => {
                    self.state = SessionState::Fetching;
                    return Some(StreamEvent::loading(&self.symbol));
                }
                SessionState::Fetching => {
                    let cancel = self.cancel.clone();
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = fetch_sample(
                            self.source.as_ref(),
                            &self.symbol,
                            self.policy.scrape_timeout,
                            &self.policy.sanity_band,
                        ) => Some(result),
                    };

                    let Some(result) = outcome else {
                        self.terminate("cancelled during fetch");
                        return None;
                    };

                    self.state = SessionState::Sleeping(self.policy.delay_after(result.is_ok()));
                    return Some(match result {
                        Ok(sample) => StreamEvent::Update(sample),
                        Err(e) => StreamEvent::error(&self.symbol, &e),
                    });
                }
                SessionState::Sleeping(delay) => {
                    let cancel = self.cancel.clone();
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            self.terminate("cancelled during sleep");
                            return None;
                        }
                        _ = tokio::time::sleep(delay) => {
                            self.state = SessionState::Polling;
                        }
                    }
                }
                SessionState::Terminated => return None,
            }
        }
    }

    fn start(&mut self) -> StreamEvent {
        if self.symbol.is_empty() {
            self.state = SessionState::Terminated;
            let err = StreamError::SetupFailure("Empty symbol".to_string());
            return StreamEvent::error(&self.symbol, &err);
        }

        let guard = self.registry.register(&self.symbol, self.handle);
        let first = guard.is_first();
        self.guard = Some(guard);
        self.state = SessionState::Polling;

        info!(symbol = %self.symbol, client = %self.handle, first, "Stream session started");
        StreamEvent::connected(&self.symbol)
    }

    fn terminate(&mut self, reason: &str) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        if let Some(guard) = self.guard.take() {
            drop(guard);
            info!(symbol = %self.symbol, client = %self.handle, reason, "Stream session closed");
        }
    }

    /// 세션을 이벤트 스트림으로 변환합니다.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let span = stream_span!("longshort_session", self.symbol, self.handle);
        futures::stream::unfold(self, move |mut session| {
            let span = span.clone();
            async move {
                let event = session.next_event().await?;
                Some((event, session))
            }
            .instrument(span)
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.guard.is_some() {
            debug!(symbol = %self.symbol, client = %self.handle, "Stream consumer dropped");
        }
    }
}
