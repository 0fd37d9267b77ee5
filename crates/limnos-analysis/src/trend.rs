//! Linear trend fitting
//!
//! Ordinary least squares over the sample index (x = 0..n-1). Callers pass an
//! evenly spaced window, so the slope is in parameter units per sample.

use serde::Serialize;

use crate::EPSILON;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Result of a trend fit
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Absolute slope, units per sample
    pub rate: f64,
    /// Signed slope, units per sample
    pub slope: f64,
    /// Coefficient of determination, clamped to [0, 1]
    pub confidence: f64,
    pub samples: usize,
}

impl TrendResult {
    /// No usable trend
    pub const FLAT: TrendResult = TrendResult {
        direction: TrendDirection::Stable,
        rate: 0.0,
        slope: 0.0,
        confidence: 0.0,
        samples: 0,
    };
}

/// Least-squares trend analyzer
#[derive(Clone, Copy, Debug)]
pub struct TrendAnalyzer {
    /// Fewer points than this yield `TrendResult::FLAT`
    pub min_points: usize,
    /// Slopes smaller than this in magnitude are `Stable`
    pub stable_below: f64,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        TrendAnalyzer {
            min_points: 3,
            stable_below: 0.01,
        }
    }
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a line through `values`
    pub fn fit(&self, values: &[f64]) -> TrendResult {
        let n = values.len();
        if n < self.min_points.max(2) || values.iter().any(|v| !v.is_finite()) {
            return TrendResult {
                samples: n,
                ..TrendResult::FLAT
            };
        }

        let nf = n as f64;
        let x_mean = (nf - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / nf;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxx += dx * dx;
            sxy += dx * (y - y_mean);
        }

        let slope = sxy / sxx;
        if !slope.is_finite() {
            return TrendResult {
                samples: n,
                ..TrendResult::FLAT
            };
        }
        let intercept = y_mean - slope * x_mean;

        let mut ss_tot = 0.0;
        let mut ss_res = 0.0;
        for (i, y) in values.iter().enumerate() {
            let fitted = intercept + slope * i as f64;
            ss_tot += (y - y_mean).powi(2);
            ss_res += (y - fitted).powi(2);
        }

        // A flat series explains nothing
        let r_squared = if ss_tot <= EPSILON {
            0.0
        } else {
            1.0 - ss_res / ss_tot
        };
        let confidence = if r_squared.is_finite() {
            r_squared.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let direction = if slope.abs() < self.stable_below {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        TrendResult {
            direction,
            rate: slope.abs(),
            slope,
            confidence,
            samples: n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_too_few_points() {
        let t = TrendAnalyzer::new().fit(&[1.0, 2.0]);
        assert_eq!(t.direction, TrendDirection::Stable);
        assert_eq!(t.rate, 0.0);
        assert_eq!(t.confidence, 0.0);
    }

    #[test]
    fn test_monotonic_increasing() {
        let values: Vec<f64> = (1..=12).map(|i| i as f64).collect();
        let t = TrendAnalyzer::new().fit(&values);
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert!((t.rate - 1.0).abs() < 1e-12);
        assert!((t.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decreasing() {
        let values: Vec<f64> = (0..12).map(|i| 9.0 - 0.25 * i as f64).collect();
        let t = TrendAnalyzer::new().fit(&values);
        assert_eq!(t.direction, TrendDirection::Decreasing);
        assert!((t.slope + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_constant_is_stable() {
        let t = TrendAnalyzer::new().fit(&[5.0; 10]);
        assert_eq!(t.direction, TrendDirection::Stable);
        assert_eq!(t.rate, 0.0);
    }

    #[test]
    fn test_small_slope_is_stable() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 0.005 * i as f64).collect();
        assert_eq!(TrendAnalyzer::new().fit(&values).direction, TrendDirection::Stable);
    }

    #[test]
    fn test_non_finite_input() {
        let t = TrendAnalyzer::new().fit(&[1.0, f64::NAN, 3.0, 4.0]);
        assert_eq!(t.direction, TrendDirection::Stable);
        assert_eq!(t.confidence, 0.0);
    }

    proptest! {
        #[test]
        fn prop_confidence_in_unit_interval(values in prop::collection::vec(-1e3f64..1e3, 0..40)) {
            let t = TrendAnalyzer::new().fit(&values);
            prop_assert!((0.0..=1.0).contains(&t.confidence));
            prop_assert!(t.rate >= 0.0);
        }
    }
}
