//! Score normalization and composite calculation
//!
//! Judge scores (1-5) and secondary metrics (0-1) are mapped onto a common
//! 0-1 axis and combined with configurable weights. A missing layer never
//! counts as zero: its weight moves onto the layers that are present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Map a 1-5 judge score onto 0-1
pub fn normalize_judge(score: u8) -> f64 {
    ((f64::from(score) - 1.0) / 4.0).clamp(0.0, 1.0)
}

/// Mean of the secondary metrics, or `None` when there are none
pub fn normalize_secondary(metrics: &BTreeMap<String, f64>) -> Option<f64> {
    if metrics.is_empty() {
        return None;
    }
    let sum: f64 = metrics.values().sum();
    Some((sum / metrics.len() as f64).clamp(0.0, 1.0))
}

/// Relative weights of the judge and secondary layers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_weight")]
    pub judge_weight: f64,
    #[serde(default = "default_weight")]
    pub secondary_weight: f64,
}

fn default_weight() -> f64 {
    0.5
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            judge_weight: default_weight(),
            secondary_weight: default_weight(),
        }
    }
}

impl Weights {
    pub fn new(judge_weight: f64, secondary_weight: f64) -> Self {
        Self {
            judge_weight,
            secondary_weight,
        }
    }

    /// Weights must be finite, non-negative and sum to 1
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("judge_weight", self.judge_weight),
            ("secondary_weight", self.secondary_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EvalError::config(format!(
                    "scoring.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        let sum = self.judge_weight + self.secondary_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(EvalError::config(format!(
                "scoring weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// Combine normalized layer scores into one 0-1 value
///
/// Layers that are absent drop out and the remaining weights are rescaled to
/// sum to one. When every present layer has zero weight they are averaged
/// evenly. Returns `None` when no layer is present.
pub fn composite(judge: Option<f64>, secondary: Option<f64>, weights: &Weights) -> Option<f64> {
    let layers: Vec<(f64, f64)> = [
        judge.map(|v| (v, weights.judge_weight)),
        secondary.map(|v| (v, weights.secondary_weight)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if layers.is_empty() {
        return None;
    }

    let total_weight: f64 = layers.iter().map(|(_, w)| w).sum();
    let value = if total_weight > 0.0 {
        layers.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight
    } else {
        layers.iter().map(|(v, _)| v).sum::<f64>() / layers.len() as f64
    };

    Some(value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_judge_scale() {
        assert_eq!(normalize_judge(1), 0.0);
        assert_eq!(normalize_judge(3), 0.5);
        assert_eq!(normalize_judge(5), 1.0);
        assert_eq!(normalize_judge(0), 0.0);
        assert_eq!(normalize_judge(9), 1.0);
    }

    #[test]
    fn test_normalize_secondary_mean() {
        let mut metrics = BTreeMap::new();
        assert_eq!(normalize_secondary(&metrics), None);
        metrics.insert("correctness".to_string(), 0.8);
        metrics.insert("coherence".to_string(), 0.9);
        assert!(approx(normalize_secondary(&metrics).unwrap(), 0.85));
    }

    #[test]
    fn test_composite_equal_weights() {
        // judge 4 -> 0.75, secondary mean 0.85
        let weights = Weights::new(0.5, 0.5);
        let value = composite(Some(normalize_judge(4)), Some(0.85), &weights).unwrap();
        assert!(approx(value, 0.80));
    }

    #[test]
    fn test_composite_redistributes_missing_layer() {
        let weights = Weights::new(0.7, 0.3);
        let judge = normalize_judge(4);
        assert!(approx(composite(Some(judge), None, &weights).unwrap(), judge));
        assert!(approx(composite(None, Some(0.4), &weights).unwrap(), 0.4));
        assert_eq!(composite(None, None, &weights), None);
    }

    #[test]
    fn test_composite_zero_weight_layer_present_alone() {
        let weights = Weights::new(1.0, 0.0);
        assert!(approx(composite(None, Some(0.6), &weights).unwrap(), 0.6));
    }

    #[test]
    fn test_composite_is_monotone() {
        let weights = Weights::new(0.6, 0.4);
        let mut previous = -1.0;
        for score in 1..=5u8 {
            let value = composite(Some(normalize_judge(score)), Some(0.5), &weights).unwrap();
            assert!(value >= previous);
            previous = value;
        }

        let mut previous = -1.0;
        for step in 0..=10 {
            let secondary = step as f64 / 10.0;
            let value = composite(Some(0.5), Some(secondary), &weights).unwrap();
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_weights_validation() {
        assert!(Weights::new(0.5, 0.5).validate().is_ok());
        assert!(Weights::new(1.0, 0.0).validate().is_ok());
        assert!(Weights::new(0.6, 0.6).validate().is_err());
        assert!(Weights::new(-0.5, 1.5).validate().is_err());
        assert!(Weights::new(f64::NAN, 0.5).validate().is_err());
    }
}
