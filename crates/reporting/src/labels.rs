//! Retention phase and benchmark labels. Both are pure functions of a
//! bucket's months-since-first (and, for benchmarks, its retention rate).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetentionPhase {
    #[serde(rename = "Acquisition")]
    Acquisition,
    #[serde(rename = "Critical Period")]
    CriticalPeriod,
    #[serde(rename = "Early Retention")]
    EarlyRetention,
    #[serde(rename = "Mid Retention")]
    MidRetention,
    #[serde(rename = "Long-term Loyalty")]
    LongTermLoyalty,
}

impl RetentionPhase {
    /// Month 7 onward is long-term, including horizons beyond a year.
    pub fn for_month(months_since_first: u32) -> Self {
        match months_since_first {
            0 => RetentionPhase::Acquisition,
            1 => RetentionPhase::CriticalPeriod,
            2..=3 => RetentionPhase::EarlyRetention,
            4..=6 => RetentionPhase::MidRetention,
            _ => RetentionPhase::LongTermLoyalty,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPhase::Acquisition => "Acquisition",
            RetentionPhase::CriticalPeriod => "Critical Period",
            RetentionPhase::EarlyRetention => "Early Retention",
            RetentionPhase::MidRetention => "Mid Retention",
            RetentionPhase::LongTermLoyalty => "Long-term Loyalty",
        }
    }
}

impl fmt::Display for RetentionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checkpoint verdicts at months 1, 3, 6 and 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Benchmark {
    #[serde(rename = "Critical: below 30% month-1 retention")]
    CriticalMonthOne,
    #[serde(rename = "Warning: below 20% month-3 retention")]
    WarningMonthThree,
    #[serde(rename = "Warning: below 15% month-6 retention")]
    WarningMonthSix,
    #[serde(rename = "Good: 10%+ month-12 retention")]
    GoodMonthTwelve,
    #[serde(rename = "Poor: below 10% month-12 retention")]
    PoorMonthTwelve,
}

impl Benchmark {
    /// `None` when the bucket is not a checkpoint, passes its checkpoint, or
    /// has no defined retention rate.
    pub fn classify(months_since_first: u32, retention_rate_pct: Option<Decimal>) -> Option<Self> {
        let rate = retention_rate_pct?;
        match months_since_first {
            1 if rate < Decimal::from(30) => Some(Benchmark::CriticalMonthOne),
            3 if rate < Decimal::from(20) => Some(Benchmark::WarningMonthThree),
            6 if rate < Decimal::from(15) => Some(Benchmark::WarningMonthSix),
            12 if rate >= Decimal::TEN => Some(Benchmark::GoodMonthTwelve),
            12 => Some(Benchmark::PoorMonthTwelve),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Benchmark::CriticalMonthOne => "Critical: below 30% month-1 retention",
            Benchmark::WarningMonthThree => "Warning: below 20% month-3 retention",
            Benchmark::WarningMonthSix => "Warning: below 15% month-6 retention",
            Benchmark::GoodMonthTwelve => "Good: 10%+ month-12 retention",
            Benchmark::PoorMonthTwelve => "Poor: below 10% month-12 retention",
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: i64) -> Option<Decimal> {
        Some(Decimal::from(v))
    }

    #[test]
    fn test_phase_ranges() {
        let phases: Vec<_> = (0..=12).map(RetentionPhase::for_month).collect();
        assert_eq!(phases[0], RetentionPhase::Acquisition);
        assert_eq!(phases[1], RetentionPhase::CriticalPeriod);
        assert_eq!(phases[2], RetentionPhase::EarlyRetention);
        assert_eq!(phases[3], RetentionPhase::EarlyRetention);
        assert!(phases[4..=6].iter().all(|p| *p == RetentionPhase::MidRetention));
        assert!(phases[7..=12].iter().all(|p| *p == RetentionPhase::LongTermLoyalty));
    }

    #[test]
    fn test_benchmark_checkpoints() {
        assert_eq!(Benchmark::classify(1, pct(25)), Some(Benchmark::CriticalMonthOne));
        assert_eq!(Benchmark::classify(1, pct(30)), None);
        assert_eq!(Benchmark::classify(3, pct(19)), Some(Benchmark::WarningMonthThree));
        assert_eq!(Benchmark::classify(3, pct(20)), None);
        assert_eq!(Benchmark::classify(6, pct(14)), Some(Benchmark::WarningMonthSix));
        assert_eq!(Benchmark::classify(6, pct(15)), None);
        assert_eq!(Benchmark::classify(12, pct(10)), Some(Benchmark::GoodMonthTwelve));
        assert_eq!(Benchmark::classify(12, pct(9)), Some(Benchmark::PoorMonthTwelve));
    }

    #[test]
    fn test_benchmark_off_checkpoint_or_undefined() {
        assert_eq!(Benchmark::classify(0, pct(100)), None);
        assert_eq!(Benchmark::classify(2, pct(1)), None);
        assert_eq!(Benchmark::classify(12, None), None);
    }

    #[test]
    fn test_labels_serialize_as_text() {
        let json = serde_json::to_string(&RetentionPhase::LongTermLoyalty).unwrap();
        assert_eq!(json, "\"Long-term Loyalty\"");
        let json = serde_json::to_string(&Benchmark::GoodMonthTwelve).unwrap();
        assert_eq!(json, "\"Good: 10%+ month-12 retention\"");
    }
}
