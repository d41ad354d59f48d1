//! 심볼별 스트림 구독자 레지스트리.
//!
//! 심볼 키는 구독자 집합이 비어 있지 않을 때만 존재합니다. 마지막 구독자가
//! 떠나면 키 자체를 제거하여, 키의 존재가 곧 "소스 조회가 필요함"을 뜻하게 합니다.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use semaforo_core::Symbol;

use crate::metrics::set_stream_gauges;

/// 스트림 구독자 식별자. 연결마다 새로 발급되며 재사용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientHandle(Uuid);

impl ClientHandle {
    /// 새 핸들 발급.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 관측용 레지스트리 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// 심볼별 구독자 수 (0인 항목은 없음)
    pub clients_per_symbol: BTreeMap<Symbol, usize>,
}

impl RegistrySnapshot {
    /// 구독자가 있는 심볼 목록 (정렬됨).
    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.clients_per_symbol.keys().cloned().collect()
    }

    /// 전체 구독자 수.
    pub fn total_clients(&self) -> usize {
        self.clients_per_symbol.values().sum()
    }
}

/// 심볼 → 구독자 집합.
///
/// 모든 변경은 하나의 뮤텍스 아래에서 원자적으로 수행됩니다.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    inner: Mutex<HashMap<Symbol, HashSet<ClientHandle>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Symbol, HashSet<ClientHandle>>> {
        // 임계 구역에서 패닉이 나도 맵은 항상 일관된 상태
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 구독을 등록합니다.
    ///
    /// 이 심볼의 첫 구독자면 `true`를 반환합니다. 이미 등록된 핸들이면 아무것도 바꾸지 않고
    /// `false`를 반환합니다.
    pub fn attach(&self, symbol: &Symbol, handle: ClientHandle) -> bool {
        let mut map = self.lock();
        let clients = map.entry(symbol.clone()).or_default();
        let first = clients.is_empty();
        let inserted = clients.insert(handle);
        publish_gauges(&map);

        debug!(symbol = %symbol, client = %handle, inserted, "Registry attach");
        first && inserted
    }

    /// 구독을 해제합니다.
    ///
    /// 집합이 비어 심볼이 제거되면 `true`를 반환합니다. 등록되지 않은 핸들은 무시합니다.
    pub fn detach(&self, symbol: &Symbol, handle: ClientHandle) -> bool {
        let mut map = self.lock();
        let Some(clients) = map.get_mut(symbol) else {
            return false;
        };
        if !clients.remove(&handle) {
            return false;
        }

        let emptied = clients.is_empty();
        if emptied {
            map.remove(symbol);
        }
        publish_gauges(&map);

        debug!(symbol = %symbol, client = %handle, emptied, "Registry detach");
        emptied
    }

    /// 현재 구독 현황.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let map = self.lock();
        RegistrySnapshot {
            clients_per_symbol: map
                .iter()
                .map(|(symbol, clients)| (symbol.clone(), clients.len()))
                .collect(),
        }
    }

    /// 심볼의 구독자 수.
    pub fn client_count(&self, symbol: &Symbol) -> usize {
        self.lock().get(symbol).map_or(0, HashSet::len)
    }

    /// 구독을 등록하고, 드롭될 때 정확히 한 번 해제하는 가드를 반환합니다.
    ///
    /// 첫 구독자 여부는 등록과 같은 잠금 안에서 결정되어 가드에 보관됩니다.
    pub fn register(self: &Arc<Self>, symbol: &Symbol, handle: ClientHandle) -> RegistryGuard {
        let first = self.attach(symbol, handle);
        RegistryGuard {
            registry: Arc::clone(self),
            symbol: symbol.clone(),
            handle,
            first,
        }
    }
}

fn publish_gauges(map: &HashMap<Symbol, HashSet<ClientHandle>>) {
    let sessions: usize = map.values().map(HashSet::len).sum();
    set_stream_gauges(sessions, map.len());
}

/// 스코프 기반 구독. 드롭 시 레지스트리에서 해제됩니다.
#[derive(Debug)]
pub struct RegistryGuard {
    registry: Arc<SymbolRegistry>,
    symbol: Symbol,
    handle: ClientHandle,
    first: bool,
}

impl RegistryGuard {
    /// 등록 시점에 이 심볼의 첫 구독자였는지 여부.
    pub fn is_first(&self) -> bool {
        self.first
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.detach(&self.symbol, self.handle);
    }
}
