use serde::{Deserialize, Serialize};

/// Discrete rating of an overall protection rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionTier {
    Failed,
    Poor,
    Moderate,
    Good,
    Excellent,
}

/// Slack for rates that are exactly on a bound but reach it through a
/// floating-point mean, e.g. (0.4 + 1.0 + 1.0) / 3 = 0.7999999999999999.
const BOUND_TOLERANCE: f64 = 1e-9;

impl ProtectionTier {
    /// Lower bounds are inclusive: 0.95 excellent, 0.80 good, 0.60 moderate,
    /// 0.30 poor, anything below failed.
    pub fn from_rate(rate: f64) -> Self {
        let reaches = |bound: f64| rate + BOUND_TOLERANCE >= bound;

        if reaches(0.95) {
            ProtectionTier::Excellent
        } else if reaches(0.80) {
            ProtectionTier::Good
        } else if reaches(0.60) {
            ProtectionTier::Moderate
        } else if reaches(0.30) {
            ProtectionTier::Poor
        } else {
            ProtectionTier::Failed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProtectionTier::Excellent => "excellent",
            ProtectionTier::Good => "good",
            ProtectionTier::Moderate => "moderate",
            ProtectionTier::Poor => "poor",
            ProtectionTier::Failed => "failed",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ProtectionTier::Excellent | ProtectionTier::Good => "✅",
            ProtectionTier::Moderate | ProtectionTier::Poor => "⚠️",
            ProtectionTier::Failed => "❌",
        }
    }
}

/// Mean of the technique rates; 0.0 when there is nothing to aggregate
pub fn aggregate(rates: &[f64]) -> f64 {
    if rates.is_empty() {
        return 0.0;
    }
    rates.iter().sum::<f64>() / rates.len() as f64
}
