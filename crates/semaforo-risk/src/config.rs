//! 리스크 모델 설정.
//!
//! 지표별 가중치와 신호등 색상 임계값을 정의합니다.

use serde::{Deserialize, Serialize};

/// 지표 가중치 합이 1에서 벗어나도 되는 허용 오차.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// 리스크 점수 모델 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModelConfig {
    /// 펀딩비 점수 가중치 (기본값: 0.25)
    #[serde(default = "default_funding_weight")]
    pub funding_weight: f64,

    /// 미결제약정 점수 가중치 (기본값: 0.20)
    #[serde(default = "default_open_interest_weight")]
    pub open_interest_weight: f64,

    /// 롱/숏 비율 점수 가중치 (기본값: 0.25)
    #[serde(default = "default_long_short_weight")]
    pub long_short_weight: f64,

    /// 청산 점수 가중치 (기본값: 0.20)
    #[serde(default = "default_liquidation_weight")]
    pub liquidation_weight: f64,

    /// 변동성 점수 가중치 (기본값: 0.10)
    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,

    /// 이 값 미만이고 위험 요인이 없으면 초록 (기본값: 20)
    #[serde(default = "default_green_below")]
    pub green_below: f64,

    /// 이 값 미만이면 노랑, 이상이면 빨강 (기본값: 50)
    #[serde(default = "default_yellow_below")]
    pub yellow_below: f64,

    /// 위험 요인 1개당 가산 점수 (기본값: 10)
    #[serde(default = "default_factor_penalty")]
    pub factor_penalty: f64,
}

// 기본값 함수들
fn default_funding_weight() -> f64 {
    0.25
}

fn default_open_interest_weight() -> f64 {
    0.20
}

fn default_long_short_weight() -> f64 {
    0.25
}

fn default_liquidation_weight() -> f64 {
    0.20
}

fn default_volatility_weight() -> f64 {
    0.10
}

fn default_green_below() -> f64 {
    20.0
}

fn default_yellow_below() -> f64 {
    50.0
}

fn default_factor_penalty() -> f64 {
    10.0
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            funding_weight: default_funding_weight(),
            open_interest_weight: default_open_interest_weight(),
            long_short_weight: default_long_short_weight(),
            liquidation_weight: default_liquidation_weight(),
            volatility_weight: default_volatility_weight(),
            green_below: default_green_below(),
            yellow_below: default_yellow_below(),
            factor_penalty: default_factor_penalty(),
        }
    }
}

impl RiskModelConfig {
    /// 병합된 설정 원본의 `[risk]` 섹션을 읽고 검증합니다. 섹션이 없으면 기본값.
    pub fn from_sources(sources: &config::Config) -> Result<Self, ConfigValidationError> {
        let model = match sources.get::<RiskModelConfig>("risk") {
            Ok(model) => model,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(ConfigValidationError::InvalidValue(e.to_string())),
        };
        model.validate()?;
        Ok(model)
    }

    /// 가중치 합계.
    pub fn weight_sum(&self) -> f64 {
        self.funding_weight
            + self.open_interest_weight
            + self.long_short_weight
            + self.liquidation_weight
            + self.volatility_weight
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let weights = [
            ("funding_weight", self.funding_weight),
            ("open_interest_weight", self.open_interest_weight),
            ("long_short_weight", self.long_short_weight),
            ("liquidation_weight", self.liquidation_weight),
            ("volatility_weight", self.volatility_weight),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "{} must be between 0 and 1",
                    name
                )));
            }
        }

        if (self.weight_sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigValidationError::InvalidValue(format!(
                "weights must sum to 1 (got {:.4})",
                self.weight_sum()
            )));
        }

        if self.green_below <= 0.0 || self.green_below >= self.yellow_below {
            return Err(ConfigValidationError::InvalidValue(
                "green_below must be positive and below yellow_below".into(),
            ));
        }

        if self.yellow_below > 100.0 {
            return Err(ConfigValidationError::InvalidValue(
                "yellow_below must not exceed 100".into(),
            ));
        }

        if self.factor_penalty < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "factor_penalty must not be negative".into(),
            ));
        }

        Ok(())
    }
}

/// 설정 검증 오류.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
