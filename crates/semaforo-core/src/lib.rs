//! # Semaforo Core
//!
//! 리스크 신호등 봇의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼 및 타임프레임 정의
//! - 롱/숏 비율 샘플과 sanity band 검증
//! - 스트림 이벤트 (connected / loading / update / error)
//! - 비율 소스 및 시장 데이터 제공자 trait
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
