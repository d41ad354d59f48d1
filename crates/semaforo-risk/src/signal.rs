//! 신호등 색상.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 리스크 신호등 색상. 순서는 위험도 오름차순입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Green,
    Yellow,
    Red,
}

impl SignalColor {
    /// 소문자 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    /// 표시용 이모지.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Green => "🟢",
            Self::Yellow => "🟡",
            Self::Red => "🔴",
        }
    }

    /// 전체 신호에 대한 권고 문구.
    pub fn global_recommendation(&self) -> &'static str {
        match self {
            Self::Green => "Favorable conditions to trade. Low risk.",
            Self::Yellow => "Medium risk. Wait for confirmation or enter with moderate size.",
            Self::Red => "High risk. Trading not recommended, or use reduced size.",
        }
    }

    /// 가장 위험한 색상. 비어 있으면 초록입니다.
    pub fn worst<I>(colors: I) -> Self
    where
        I: IntoIterator<Item = SignalColor>,
    {
        colors.into_iter().max().unwrap_or(Self::Green)
    }
}

impl fmt::Display for SignalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_color() {
        use SignalColor::*;

        assert_eq!(SignalColor::worst([Green, Red, Yellow]), Red);
        assert_eq!(SignalColor::worst([Green, Yellow]), Yellow);
        assert_eq!(SignalColor::worst([Green]), Green);
        assert_eq!(SignalColor::worst(Vec::new()), Green);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&SignalColor::Yellow).unwrap(), "\"yellow\"");
        let color: SignalColor = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(color, SignalColor::Red);
    }
}
