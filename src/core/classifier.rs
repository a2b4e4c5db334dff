//! Rule-based risk classification over a window of signal samples.
//!
//! The classifier is total: it never fails and degenerates gracefully on
//! short or empty windows. Step order matters - the high-variance rule runs
//! last and overrides whatever tier the rate and stability rules picked.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Lower bound of the normal resting heart-rate band (BPM).
const RATE_NORMAL_MIN: f64 = 60.0;

/// Upper bound of the normal resting heart-rate band (BPM).
const RATE_NORMAL_MAX: f64 = 100.0;

/// Rate beyond which an abnormal reading is tiered high rather than medium.
const RATE_HIGH_CUTOFF: f64 = 120.0;

/// Rate below which an abnormal reading is tiered high rather than medium.
const RATE_LOW_CUTOFF: f64 = 50.0;

/// Variance below which the signal counts as stable.
const STABLE_VARIANCE: f64 = 0.1;

/// Variance above which the assessment is forced to critical.
const CRITICAL_VARIANCE: f64 = 0.2;

/// Risk tier of an assessment. Tiers only escalate within a single
/// classification call, never downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single classification call. Transient; never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Overall risk tier
    pub risk_level: RiskLevel,
    /// Confidence in the assessment (0-1)
    pub confidence: f64,
    /// Population variance of the input window
    pub ecg_variance: f64,
    /// Whether any rule flagged an anomaly
    pub anomaly_detected: bool,
    /// Human-readable recommendations, never empty
    pub recommendations: Vec<String>,
}

/// Classify a window of signal values together with a heart-rate estimate.
pub fn classify(window: &[f64], rate: f64) -> RiskAssessment {
    let variance = population_variance(window);
    let rate_normal = (RATE_NORMAL_MIN..=RATE_NORMAL_MAX).contains(&rate);
    let signal_stable = variance < STABLE_VARIANCE;

    let mut risk_level = RiskLevel::Low;
    let mut confidence = 0.85;
    let mut anomaly_detected = false;
    let mut recommendations: Vec<String> = Vec::new();

    if !rate_normal {
        risk_level = if rate > RATE_HIGH_CUTOFF || rate < RATE_LOW_CUTOFF {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        anomaly_detected = true;
        recommendations.push(
            if rate > RATE_HIGH_CUTOFF {
                "Consider rest and hydration"
            } else {
                "Monitor for bradycardia"
            }
            .to_string(),
        );
    }

    if !signal_stable {
        risk_level = if risk_level == RiskLevel::High {
            RiskLevel::Critical
        } else {
            RiskLevel::Medium
        };
        anomaly_detected = true;
        recommendations
            .push("ECG irregularity detected - consult healthcare provider".to_string());
    }

    // Variance dominates: this override runs last and ignores the tier the
    // rate and stability rules picked.
    if variance > CRITICAL_VARIANCE {
        risk_level = RiskLevel::Critical;
        confidence = 0.95;
        recommendations
            .push("Significant ECG abnormality - seek immediate medical attention".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Continue normal monitoring".to_string());
    }

    RiskAssessment {
        risk_level,
        confidence,
        ecg_variance: variance,
        anomaly_detected,
        recommendations,
    }
}

/// Population variance of a window; 0 for windows shorter than 2 samples.
pub fn population_variance(window: &[f64]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    window.iter().population_variance()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_zero_for_short_windows() {
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[0.7]), 0.0);
    }

    #[test]
    fn test_variance_known_value() {
        // Population variance of [1,2,3,4] is 1.25
        let v = population_variance(&[1.0, 2.0, 3.0, 4.0]);
        assert!((v - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_normal_rate_stable_signal_is_low() {
        for rate in [60.0, 72.0, 100.0] {
            let assessment = classify(&[0.0, 0.01, -0.01, 0.02], rate);
            assert_eq!(assessment.risk_level, RiskLevel::Low);
            assert!(!assessment.anomaly_detected);
            assert_eq!(assessment.confidence, 0.85);
            assert_eq!(
                assessment.recommendations,
                vec!["Continue normal monitoring".to_string()]
            );
        }
    }

    #[test]
    fn test_flat_window_at_resting_rate() {
        let assessment = classify(&[0.0; 6], 72.0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(!assessment.anomaly_detected);
        assert_eq!(
            assessment.recommendations,
            vec!["Continue normal monitoring".to_string()]
        );
    }

    #[test]
    fn test_mildly_abnormal_rate_is_medium() {
        let assessment = classify(&[0.0; 6], 110.0);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert!(assessment.anomaly_detected);
    }

    #[test]
    fn test_extreme_rates_are_high() {
        for rate in [130.0, 45.0] {
            let assessment = classify(&[0.0; 6], rate);
            assert_eq!(assessment.risk_level, RiskLevel::High, "rate {rate}");
            assert!(assessment.anomaly_detected);
        }
    }

    #[test]
    fn test_rate_recommendation_texts() {
        let tachy = classify(&[0.0; 6], 130.0);
        assert!(tachy.recommendations[0].contains("rest and hydration"));

        let brady = classify(&[0.0; 6], 45.0);
        assert!(brady.recommendations[0].contains("bradycardia"));
    }

    #[test]
    fn test_unstable_signal_escalates_high_to_critical() {
        // Variance of [0, 0.6, -0.6, 0.5, -0.5] is ~0.2448: unstable AND
        // above the critical cutoff, with a rate in the high tier.
        let assessment = classify(&[0.0, 0.6, -0.6, 0.5, -0.5], 130.0);
        assert!(assessment.anomaly_detected);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_unstable_signal_alone_is_medium() {
        // Variance ~0.125: unstable but under the critical cutoff.
        let window = [0.0, 0.5, -0.5, 0.5, -0.5, 0.0];
        let v = population_variance(&window);
        assert!(v >= STABLE_VARIANCE && v <= CRITICAL_VARIANCE, "variance {v}");

        let assessment = classify(&window, 72.0);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert!(assessment.anomaly_detected);
        assert!(assessment.recommendations[0].contains("irregularity"));
    }

    #[test]
    fn test_high_variance_forces_critical_regardless_of_rate() {
        // Variance 0.25 > critical cutoff
        let window = [0.5, -0.5, 0.5, -0.5];
        assert!((population_variance(&window) - 0.25).abs() < 1e-12);

        for rate in [45.0, 72.0, 130.0] {
            let assessment = classify(&window, rate);
            assert_eq!(assessment.risk_level, RiskLevel::Critical, "rate {rate}");
            assert_eq!(assessment.confidence, 0.95);
            assert!(assessment
                .recommendations
                .iter()
                .any(|r| r.contains("seek immediate medical attention")));
        }
    }

    #[test]
    fn test_bradycardia_with_high_variance_scenario() {
        let window = [0.5, -0.5, 0.5, -0.5];
        let assessment = classify(&window, 45.0);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
        assert_eq!(assessment.confidence, 0.95);
        assert!(assessment.anomaly_detected);
        assert!(assessment
            .recommendations
            .iter()
            .any(|r| r.contains("seek immediate medical attention")));
    }

    #[test]
    fn test_recommendations_never_empty() {
        for (window, rate) in [
            (vec![], 72.0),
            (vec![0.0; 10], 72.0),
            (vec![0.5, -0.5, 0.5, -0.5], 130.0),
        ] {
            let assessment = classify(&window, rate);
            assert!(!assessment.recommendations.is_empty());
        }
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
