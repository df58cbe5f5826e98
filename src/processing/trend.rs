//! Linear trend estimation over buffer positions
//!
//! Ordinary least squares of `value` against position `i ∈ [0, len)`:
//!
//! ```text
//! Sx = Σi, Sy = Σy_i, Sxy = Σ(i·y_i), Sx2 = Σ(i²)
//! b  = (N·Sxy − Sx·Sy) / (N·Sx2 − Sx²)
//! a  = (Sy − b·Sx) / N
//! ```
//!
//! The fit is rebuilt from scratch on every refit, so it always describes the
//! buffer's current positions even after an eviction re-indexed every sample.

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;

/// Result of the last refit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum TrendFit {
    /// Fewer than two samples, or a degenerate denominator.
    #[default]
    Undefined,
    /// `y = intercept + slope · x`
    Linear { slope: f64, intercept: f64 },
}

impl TrendFit {
    /// Trend value at position `index`, if the fit is defined.
    pub fn trend_at(&self, index: usize) -> Option<f64> {
        match *self {
            TrendFit::Undefined => None,
            TrendFit::Linear { slope, intercept } => Some(slope * index as f64 + intercept),
        }
    }

    /// Remove the trend from `value` at `index`.
    ///
    /// An undefined fit leaves the raw value untouched.
    pub fn detrend(&self, index: usize, value: f64) -> f64 {
        self.trend_at(index).map_or(value, |trend| value - trend)
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, TrendFit::Linear { .. })
    }

    pub fn slope(&self) -> Option<f64> {
        match *self {
            TrendFit::Linear { slope, .. } => Some(slope),
            TrendFit::Undefined => None,
        }
    }

    pub fn intercept(&self) -> Option<f64> {
        match *self {
            TrendFit::Linear { intercept, .. } => Some(intercept),
            TrendFit::Undefined => None,
        }
    }
}

/// Least-squares trend tracker for one [`SampleBuffer`].
#[derive(Debug, Clone, Default)]
pub struct TrendEstimator {
    fit: TrendFit,
}

impl TrendEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the fit from the buffer's current contents. O(len).
    pub fn refit(&mut self, buffer: &SampleBuffer) -> TrendFit {
        self.fit = fit_positions(buffer.iter().map(|(i, v)| (i, f64::from(v))));
        self.fit
    }

    pub fn fit(&self) -> TrendFit {
        self.fit
    }

    pub fn reset(&mut self) {
        self.fit = TrendFit::Undefined;
    }
}

/// Fit `(position, value)` pairs. Positions are expected to be `0..n`.
fn fit_positions(points: impl Iterator<Item = (usize, f64)>) -> TrendFit {
    let mut n = 0usize;
    let (mut sx, mut sy, mut sxy, mut sx2) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);

    for (i, y) in points {
        let x = i as f64;
        n += 1;
        sx += x;
        sy += y;
        sxy += x * y;
        sx2 += x * x;
    }

    if n < 2 {
        return TrendFit::Undefined;
    }

    let n = n as f64;
    let denominator = n * sx2 - sx * sx;
    if denominator == 0.0 || !denominator.is_finite() {
        return TrendFit::Undefined;
    }

    let slope = (n * sxy - sx * sy) / denominator;
    let intercept = (sy - slope * sx) / n;

    if !slope.is_finite() || !intercept.is_finite() {
        return TrendFit::Undefined;
    }

    TrendFit::Linear { slope, intercept }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn buffer_of(values: &[i32], capacity: usize) -> SampleBuffer {
        let mut buffer = SampleBuffer::new(capacity);
        for &v in values {
            buffer.append(v);
        }
        buffer
    }

    #[test]
    fn test_identity_ramp_is_fixed_point() {
        let values: Vec<i32> = (0..64).collect();
        let buffer = buffer_of(&values, 64);
        let fit = TrendEstimator::new().refit(&buffer);

        assert_abs_diff_eq!(fit.slope().expect("defined"), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept().expect("defined"), 0.0, epsilon = 1e-9);
        for (i, v) in buffer.iter() {
            assert_abs_diff_eq!(fit.detrend(i, f64::from(v)), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_offset_ramp() {
        // y = 100 - 3x
        let values: Vec<i32> = (0..10).map(|x| 100 - 3 * x).collect();
        let fit = TrendEstimator::new().refit(&buffer_of(&values, 16));
        assert_abs_diff_eq!(fit.slope().expect("defined"), -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept().expect("defined"), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_undefined_below_two_samples() {
        let mut estimator = TrendEstimator::new();
        assert_eq!(estimator.refit(&buffer_of(&[], 4)), TrendFit::Undefined);
        assert_eq!(estimator.refit(&buffer_of(&[42], 4)), TrendFit::Undefined);

        let fit = estimator.fit();
        assert!(!fit.is_defined());
        assert_eq!(fit.detrend(0, 42.0), 42.0);
    }

    #[test]
    fn test_two_samples_defined() {
        let fit = TrendEstimator::new().refit(&buffer_of(&[5, 9], 4));
        assert_abs_diff_eq!(fit.slope().expect("defined"), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept().expect("defined"), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_refit_tracks_eviction() {
        // After eviction the retained samples are re-indexed from zero, so
        // a ramp that started at 0 now starts at 2 with the same slope.
        let values: Vec<i32> = (0..6).collect();
        let buffer = buffer_of(&values, 4);
        let fit = TrendEstimator::new().refit(&buffer);
        assert_abs_diff_eq!(fit.slope().expect("defined"), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept().expect("defined"), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_signal_has_zero_slope() {
        let fit = TrendEstimator::new().refit(&buffer_of(&[7; 32], 32));
        assert_abs_diff_eq!(fit.slope().expect("defined"), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept().expect("defined"), 7.0, epsilon = 1e-9);
    }
}
