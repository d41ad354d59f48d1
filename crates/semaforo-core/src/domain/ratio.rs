//! 롱/숏 비율 샘플.
//!
//! 소스가 반환한 원시 값(`RatioReading`)은 sanity band 검증을 거쳐야만
//! 소비자에게 전달 가능한 `RatioSample`이 됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::types::Symbol;

/// 소스가 반환한 원시 롱/숏 백분율.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioReading {
    /// 롱 포지션 비중 (%)
    pub long_percent: f64,
    /// 숏 포지션 비중 (%)
    pub short_percent: f64,
    /// 데이터 출처 태그 (예: "binance_api")
    pub source: String,
}

impl RatioReading {
    /// 새 읽기 값을 생성합니다.
    pub fn new(long_percent: f64, short_percent: f64, source: impl Into<String>) -> Self {
        Self {
            long_percent,
            short_percent,
            source: source.into(),
        }
    }

    /// 롱 + 숏 합계.
    pub fn total(&self) -> f64 {
        self.long_percent + self.short_percent
    }
}

/// 롱 + 숏 합계의 허용 범위 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SanityBand {
    /// 최소 합계
    pub min: f64,
    /// 최대 합계
    pub max: f64,
}

impl Default for SanityBand {
    fn default() -> Self {
        Self {
            min: 95.0,
            max: 105.0,
        }
    }
}

impl SanityBand {
    /// 새 범위를 생성합니다.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// 합계가 범위 안에 있는지 확인합니다.
    pub fn contains(&self, total: f64) -> bool {
        total.is_finite() && total >= self.min && total <= self.max
    }
}

/// 검증을 통과한 비율 샘플.
///
/// 백분율은 소수점 2자리, 비율은 소수점 3자리로 반올림됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSample {
    /// 자산 심볼
    pub symbol: Symbol,
    /// 롱 비중 (%)
    #[serde(rename = "longRatio")]
    pub long_percent: f64,
    /// 숏 비중 (%)
    #[serde(rename = "shortRatio")]
    pub short_percent: f64,
    /// 롱 / 숏
    pub ratio: f64,
    /// 샘플 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 데이터 출처 태그
    pub source: String,
}

impl RatioSample {
    /// 원시 값을 검증하여 샘플로 변환합니다.
    ///
    /// # Errors
    /// 값이 음수/NaN이거나 숏 비중이 0이거나 합계가 `band`를 벗어나면
    /// `StreamError::InvalidSample`을 반환합니다.
    pub fn from_reading(
        symbol: &Symbol,
        reading: RatioReading,
        band: &SanityBand,
    ) -> StreamResult<Self> {
        let RatioReading {
            long_percent,
            short_percent,
            source,
        } = reading;

        if !long_percent.is_finite() || !short_percent.is_finite() {
            return Err(StreamError::InvalidSample(format!(
                "{} returned non-numeric percentages",
                symbol
            )));
        }
        if long_percent < 0.0 || short_percent <= 0.0 {
            return Err(StreamError::InvalidSample(format!(
                "{} returned out-of-range percentages ({} / {})",
                symbol, long_percent, short_percent
            )));
        }

        let total = long_percent + short_percent;
        if !band.contains(total) {
            return Err(StreamError::InvalidSample(format!(
                "{} long+short = {:.2}, outside {}-{}",
                symbol, total, band.min, band.max
            )));
        }

        Ok(Self {
            symbol: symbol.clone(),
            long_percent: round_dp(long_percent, 2),
            short_percent: round_dp(short_percent, 2),
            ratio: round_dp(long_percent / short_percent, 3),
            timestamp: Utc::now(),
            source,
        })
    }
}

/// 소수점 `dp`자리 반올림.
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rounding() {
        let symbol = Symbol::new("BTC");
        let reading = RatioReading::new(63.5, 36.5, "stub");
        let sample = RatioSample::from_reading(&symbol, reading, &SanityBand::default()).unwrap();

        assert_eq!(sample.long_percent, 63.5);
        assert_eq!(sample.short_percent, 36.5);
        assert_eq!(sample.ratio, 1.74);
        assert_eq!(sample.source, "stub");
    }

    #[test]
    fn test_sample_outside_band() {
        let symbol = Symbol::new("BTC");
        let reading = RatioReading::new(70.0, 70.0, "stub");
        let err = RatioSample::from_reading(&symbol, reading, &SanityBand::default()).unwrap_err();

        assert!(matches!(err, StreamError::InvalidSample(_)));
        assert!(err.to_string().contains("140.00"));
    }

    #[test]
    fn test_band_edges_inclusive() {
        let band = SanityBand::default();
        assert!(band.contains(95.0));
        assert!(band.contains(105.0));
        assert!(!band.contains(94.99));
        assert!(!band.contains(f64::NAN));
    }

    #[test]
    fn test_zero_short_rejected() {
        let symbol = Symbol::new("ETH");
        let reading = RatioReading::new(100.0, 0.0, "stub");
        assert!(RatioSample::from_reading(&symbol, reading, &SanityBand::default()).is_err());
    }

    #[test]
    fn test_sample_json_field_names() {
        let symbol = Symbol::new("SOL");
        let sample = RatioSample::from_reading(
            &symbol,
            RatioReading::new(48.123, 51.877, "binance_api"),
            &SanityBand::default(),
        )
        .unwrap();

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["symbol"], "SOL");
        assert_eq!(json["longRatio"], 48.12);
        assert_eq!(json["shortRatio"], 51.88);
        assert_eq!(json["ratio"], 0.928);
        assert_eq!(json["source"], "binance_api");
    }

    proptest::proptest! {
        #[test]
        fn prop_band_decides_acceptance(long in 0.0f64..120.0, short in 0.01f64..120.0) {
            let band = SanityBand::default();
            let symbol = Symbol::new("BTC");
            let result = RatioSample::from_reading(
                &symbol,
                RatioReading::new(long, short, "prop"),
                &band,
            );
            proptest::prop_assert_eq!(result.is_ok(), band.contains(long + short));
        }
    }
}
