//! 비즈니스 서비스.

pub mod risk_aggregator;

pub use risk_aggregator::RiskAggregator;
