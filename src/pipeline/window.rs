//! Bounded buffer plus linear trend, kept in lock-step
//!
//! Both plot pipelines share this type and differ only in [`WindowPolicy`].
//! Every mutation refits the trend before returning, so callers holding the
//! window's lock always see a fit that matches the buffer's current
//! positions.

use crate::processing::{Sample, SampleBuffer, TrendEstimator, TrendFit};

/// When a window counts as ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// At least one sample buffered
    AnySamples,
    /// Buffer filled to capacity
    FullWindow,
}

#[derive(Debug, Clone)]
pub struct TrendWindow {
    buffer: SampleBuffer,
    trend: TrendEstimator,
    policy: WindowPolicy,
    /// Incremented on every clear.
    generation: u64,
}

impl TrendWindow {
    pub fn new(capacity: usize, policy: WindowPolicy) -> Self {
        Self {
            buffer: SampleBuffer::new(capacity),
            trend: TrendEstimator::new(),
            policy,
            generation: 0,
        }
    }

    /// Append one sample and refit. Returns the evicted sample, if any.
    pub fn push(&mut self, value: Sample) -> Option<Sample> {
        let evicted = self.buffer.append(value);
        self.trend.refit(&self.buffer);
        evicted
    }

    /// Drop all samples and the fit.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.trend.reset();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_ready(&self) -> bool {
        match self.policy {
            WindowPolicy::AnySamples => !self.buffer.is_empty(),
            WindowPolicy::FullWindow => self.buffer.is_full(),
        }
    }

    /// `round(value[i] − trend(i))`, or the raw value while the fit is undefined.
    pub fn detrended(&self, index: usize) -> Option<f64> {
        let fit = self.trend.fit();
        self.buffer
            .get(index)
            .map(|v| detrend_rounded(&fit, index, v))
    }

    /// Every buffered sample detrended at its own position.
    pub fn detrended_values(&self) -> Vec<f64> {
        let fit = self.trend.fit();
        self.buffer
            .iter()
            .map(|(i, v)| detrend_rounded(&fit, i, v))
            .collect()
    }

    /// Unrounded residuals at every position, used as transform input.
    pub fn residuals(&self) -> Vec<f64> {
        let fit = self.trend.fit();
        self.buffer
            .iter()
            .map(|(i, v)| fit.detrend(i, f64::from(v)))
            .collect()
    }

    pub fn fit(&self) -> TrendFit {
        self.trend.fit()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn detrend_rounded(fit: &TrendFit, index: usize, value: Sample) -> f64 {
    fit.detrend(index, f64::from(value)).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_fit_current() {
        let mut window = TrendWindow::new(4, WindowPolicy::AnySamples);
        assert!(!window.fit().is_defined());

        window.push(10);
        assert!(!window.fit().is_defined());
        assert_eq!(window.detrended(0), Some(10.0));

        window.push(12);
        assert_eq!(window.fit().slope(), Some(2.0));
        assert_eq!(window.detrended_values(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_eviction_reindexes_positions() {
        let mut window = TrendWindow::new(3, WindowPolicy::FullWindow);
        for v in [100, 0, 1, 2] {
            window.push(v);
        }
        // Buffer is now [0, 1, 2] at positions 0..3
        assert_eq!(window.fit().intercept(), Some(0.0));
        assert_eq!(window.detrended_values(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_readiness_policies() {
        let mut any = TrendWindow::new(3, WindowPolicy::AnySamples);
        let mut full = TrendWindow::new(3, WindowPolicy::FullWindow);
        assert!(!any.is_ready());

        any.push(1);
        full.push(1);
        assert!(any.is_ready());
        assert!(!full.is_ready());

        full.push(2);
        full.push(3);
        assert!(full.is_ready());
    }

    #[test]
    fn test_clear_resets_and_bumps_generation() {
        let mut window = TrendWindow::new(3, WindowPolicy::AnySamples);
        window.push(5);
        window.push(7);
        let before = window.generation();

        window.clear();
        assert!(window.is_empty());
        assert!(!window.fit().is_defined());
        assert_eq!(window.detrended(0), None);
        assert_eq!(window.generation(), before + 1);
    }

    #[test]
    fn test_detrended_rounds_to_nearest() {
        let mut window = TrendWindow::new(3, WindowPolicy::AnySamples);
        for v in [0, 3, 1] {
            window.push(v);
        }
        // slope 0.5, intercept 5/6 → residuals -0.83, 1.67, -0.83
        assert_eq!(window.detrended_values(), vec![-1.0, 2.0, -1.0]);

        let residuals = window.residuals();
        assert!((residuals[1] - 5.0 / 3.0).abs() < 1e-12);
    }
}
