//! 도메인 모델.
//!
//! 비율 샘플, 스트림 이벤트, 시장 데이터 타입과 외부 데이터 소스 trait를 정의합니다.

mod event;
mod market_data;
mod provider;
mod ratio;

pub use event::*;
pub use market_data::*;
pub use provider::*;
pub use ratio::*;
