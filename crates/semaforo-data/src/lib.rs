//! 캐시 및 트레이드 메모리.
//!
//! 이 crate는 다음을 제공합니다:
//! - Redis 캐시 래퍼 (JSON 값, TTL, 집합 연산)
//! - 분석 결과/트레이드 상태를 보관하는 best-effort 메모리

pub mod error;
pub mod memory;
pub mod storage;

pub use error::{DataError, Result};
pub use memory::TradeMemory;
pub use storage::redis::RedisCache;
