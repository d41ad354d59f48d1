//! 롱/숏 스트림 통합 테스트.
//!
//! 외부 네트워크 없이 스텁 소스로 세션 수명주기와 레지스트리 정합성을 검증합니다.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use semaforo_api::stream::{ClientHandle, LongShortService, StreamPolicy, SymbolRegistry};
use semaforo_core::{ErrorKind, RatioReading, RatioSource, StreamEvent, StreamResult, Symbol};

// =============================================================================
// 스텁 소스
// =============================================================================

/// 고정 값을 반환하고 호출 횟수를 센다.
struct CountingSource {
    long: f64,
    short: f64,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new(long: f64, short: f64) -> Self {
        Self {
            long,
            short,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RatioSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, _symbol: &Symbol) -> StreamResult<RatioReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RatioReading::new(self.long, self.short, "counting"))
    }
}

/// 영원히 응답하지 않는 소스.
struct HangingSource;

#[async_trait]
impl RatioSource for HangingSource {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn fetch(&self, _symbol: &Symbol) -> StreamResult<RatioReading> {
        std::future::pending().await
    }
}

fn service(source: impl RatioSource + 'static) -> LongShortService {
    LongShortService::new(Arc::new(source), StreamPolicy::default())
}

// =============================================================================
// 세션 수명주기
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cancel_during_hanging_fetch_clears_registry() {
    let service = service(HangingSource);
    let btc = Symbol::new("BTC");

    let mut session = service.open(btc.clone());
    assert_eq!(session.next_event().await.map(|e| e.name()), Some("connected"));
    assert_eq!(session.next_event().await.map(|e| e.name()), Some("loading"));
    assert_eq!(service.status().total_clients(), 1);

    let token = session.cancel_token();
    let waiter = tokio::spawn(async move { session.next_event().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();

    let last = waiter.await.unwrap();
    assert!(last.is_none());
    assert_eq!(service.registry().client_count(&btc), 0);
    assert!(service.status().clients_per_symbol.is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_spaced_by_cooldown() {
    let service = service(HangingSource);
    let policy = service.policy().clone();
    let mut session = service.open(Symbol::new("ETH"));

    let mut error_times = Vec::new();
    while error_times.len() < 3 {
        let Some(event) = session.next_event().await else {
            panic!("session ended unexpectedly");
        };
        if event.name() == "error" {
            assert_eq!(event.error_kind(), Some(ErrorKind::Timeout));
            error_times.push(tokio::time::Instant::now());
        }
    }

    for pair in error_times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= policy.error_cooldown + policy.scrape_timeout);
    }
    assert!(!session.is_terminated());
}

#[tokio::test(start_paused = true)]
async fn shutdown_ends_every_session() {
    let service = service(CountingSource::new(60.0, 40.0));
    let mut first = service.open(Symbol::new("BTC"));
    let mut second = service.open(Symbol::new("SOL"));

    first.next_event().await;
    second.next_event().await;
    assert_eq!(service.status().total_clients(), 2);

    service.shutdown();

    assert!(first.next_event().await.is_none());
    assert!(second.next_event().await.is_none());
    assert_eq!(service.status().total_clients(), 0);
}

#[tokio::test(start_paused = true)]
async fn each_consumer_polls_independently() {
    let source = Arc::new(CountingSource::new(55.0, 45.0));
    let service = LongShortService::new(source.clone(), StreamPolicy::default());
    let btc = Symbol::new("BTC");

    let mut a = service.open(btc.clone());
    let mut b = service.open(btc.clone());

    for session in [&mut a, &mut b] {
        // connected, loading, update
        for _ in 0..3 {
            session.next_event().await;
        }
    }

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.registry().client_count(&btc), 2);

    drop(a);
    assert_eq!(service.registry().client_count(&btc), 1);
    drop(b);
    assert!(service.status().clients_per_symbol.is_empty());
}

// =============================================================================
// 단건 조회
// =============================================================================

#[tokio::test]
async fn query_once_returns_rounded_sample() {
    let source = Arc::new(CountingSource::new(63.5, 36.5));
    let service = LongShortService::new(source.clone(), StreamPolicy::default());

    let sample = service.query_once(&Symbol::new("btc")).await.unwrap();

    assert_eq!(sample.symbol, Symbol::new("BTC"));
    assert_eq!(sample.long_percent, 63.5);
    assert_eq!(sample.short_percent, 36.5);
    assert_eq!(sample.ratio, 1.74);
    assert_eq!(sample.source, "counting");
    // 단건 조회는 레지스트리에 흔적을 남기지 않음
    assert!(service.status().clients_per_symbol.is_empty());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn query_once_times_out() {
    let service = service(HangingSource);

    let err = service.query_once(&Symbol::new("BTC")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn query_once_rejects_out_of_band_sample() {
    let service = service(CountingSource::new(80.0, 40.0));

    let err = service.query_once(&Symbol::new("BTC")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidSample);
}

#[tokio::test]
async fn stream_ends_after_setup_failure() {
    use futures::StreamExt;

    let service = service(CountingSource::new(50.0, 50.0));
    let events: Vec<StreamEvent> = service.open(Symbol::new(" ")).into_stream().collect().await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_kind(), Some(ErrorKind::SetupFailure));
}

// =============================================================================
// 레지스트리 속성
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Attach(usize, usize),
    Detach(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, 0..6usize).prop_map(|(s, c)| Op::Attach(s, c)),
        (0..4usize, 0..6usize).prop_map(|(s, c)| Op::Detach(s, c)),
    ]
}

proptest! {
    #[test]
    fn snapshot_matches_non_empty_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let symbols = ["BTC", "ETH", "SOL", "XRP"].map(Symbol::new);
        let handles: Vec<ClientHandle> = (0..6).map(|_| ClientHandle::new()).collect();

        let registry = SymbolRegistry::new();
        let mut model: BTreeMap<Symbol, HashSet<ClientHandle>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Attach(s, c) => {
                    let set = model.entry(symbols[s].clone()).or_default();
                    let expected_first = set.is_empty();
                    let inserted = set.insert(handles[c]);
                    prop_assert_eq!(
                        registry.attach(&symbols[s], handles[c]),
                        expected_first && inserted
                    );
                }
                Op::Detach(s, c) => {
                    let mut emptied = false;
                    if let Some(set) = model.get_mut(&symbols[s]) {
                        if set.remove(&handles[c]) && set.is_empty() {
                            model.remove(&symbols[s]);
                            emptied = true;
                        }
                    }
                    prop_assert_eq!(registry.detach(&symbols[s], handles[c]), emptied);
                }
            }

            let expected: BTreeMap<Symbol, usize> = model
                .iter()
                .map(|(symbol, set)| (symbol.clone(), set.len()))
                .collect();
            prop_assert_eq!(registry.snapshot().clients_per_symbol, expected);
        }
    }
}
