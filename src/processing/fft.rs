//! Windowed magnitude spectrum using rustfft
//!
//! # Features
//!
//! - Pre-planned forward FFT for a fixed window size
//! - Unitary (energy-preserving) normalization: every coefficient is scaled
//!   by `1/√W`, so `Σ|x|² = Σ|X|²`
//! - Full two-sided magnitude output: `W` bins, one per coefficient
//!
//! # Example
//!
//! ```ignore
//! let transform = SpectralTransform::new(512)?;
//! let spectrum = transform.compute(&detrended_window)?;
//! let peak = spectrum.dominant_bin();
//! ```

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ProcessingError;

// ============================================================================
// Magnitude Spectrum
// ============================================================================

/// Magnitudes of one windowed transform.
///
/// Replaced wholesale on every recomputation; never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagnitudeSpectrum {
    /// `sqrt(re² + im²)` per bin, `W` entries
    bins: Vec<f64>,
    /// Largest magnitude across all bins
    max: f64,
    /// When the transform was computed
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl MagnitudeSpectrum {
    /// Wrap precomputed magnitudes.
    pub fn from_magnitudes(bins: Vec<f64>) -> Self {
        let max = bins.iter().copied().fold(0.0_f64, f64::max);
        Self {
            bins,
            max,
            computed_at: chrono::Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn get(&self, bin: usize) -> Option<f64> {
        self.bins.get(bin).copied()
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Largest magnitude (0 for an empty spectrum).
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Strongest positive-frequency bin, excluding DC.
    ///
    /// Searches `1..=W/2`; the upper half mirrors the lower half for real
    /// input. Returns `None` when the window is too short to have one.
    pub fn dominant_bin(&self) -> Option<usize> {
        let upper = self.bins.len() / 2;
        if upper < 1 {
            return None;
        }
        self.bins[1..=upper]
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &m)| match best {
                Some((_, best_m)) if best_m >= m => best,
                _ => Some((i + 1, m)),
            })
            .map(|(bin, _)| bin)
    }

    /// Centre frequency of `bin` in Hz for a signal sampled at `sample_rate_hz`.
    pub fn bin_frequency(&self, bin: usize, sample_rate_hz: f64) -> f64 {
        if self.bins.is_empty() {
            return 0.0;
        }
        bin as f64 * sample_rate_hz / self.bins.len() as f64
    }
}

// ============================================================================
// Spectral Transform (pre-planned for repeated use)
// ============================================================================

/// Forward FFT of a fixed window size with unitary scaling.
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
    scale: f64,
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SpectralTransform {
    /// Plan a transform over exactly `size` points.
    pub fn new(size: usize) -> Result<Self, ProcessingError> {
        if size == 0 {
            return Err(ProcessingError::InvalidWindowSize(size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Ok(Self {
            fft,
            size,
            scale: 1.0 / (size as f64).sqrt(),
        })
    }

    /// Transform a fully populated window into its magnitude spectrum.
    ///
    /// The window must hold exactly `size` values; partial windows are
    /// rejected rather than padded.
    pub fn compute(&self, window: &[f64]) -> Result<MagnitudeSpectrum, ProcessingError> {
        if window.len() != self.size {
            return Err(ProcessingError::InsufficientData {
                needed: self.size,
                available: window.len(),
            });
        }

        let mut buffer: Vec<Complex<f64>> =
            window.iter().map(|&x| Complex::new(x, 0.0)).collect();

        self.fft.process(&mut buffer);

        let magnitudes = buffer.iter().map(|c| c.norm() * self.scale).collect();

        Ok(MagnitudeSpectrum::from_magnitudes(magnitudes))
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_transform_creation() {
        let transform = SpectralTransform::new(512).expect("plan");
        assert_eq!(transform.size(), 512);
        assert!(SpectralTransform::new(0).is_err());
    }

    #[test]
    fn test_rejects_partial_window() {
        let transform = SpectralTransform::new(64).expect("plan");
        let err = transform.compute(&[0.0; 63]).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InsufficientData {
                needed: 64,
                available: 63
            }
        ));
    }

    #[test]
    fn test_sine_peak_at_bin() {
        let size = 512;
        let k = 24;
        let transform = SpectralTransform::new(size).expect("plan");
        let window: Vec<f64> = (0..size)
            .map(|i| 100.0 * (2.0 * PI * k as f64 * i as f64 / size as f64).sin())
            .collect();

        let spectrum = transform.compute(&window).expect("FFT failed");

        assert_eq!(spectrum.len(), size);
        assert!(spectrum.bins().iter().all(|&m| m >= 0.0));
        assert_eq!(spectrum.dominant_bin(), Some(k));
        // Unitary scaling: a real sine of amplitude A puts A·√W/2 in each of
        // the two mirrored bins.
        let expected = 100.0 * (size as f64).sqrt() / 2.0;
        assert_relative_eq!(spectrum.get(k).expect("bin"), expected, max_relative = 1e-9);
        assert_relative_eq!(
            spectrum.get(size - k).expect("bin"),
            expected,
            max_relative = 1e-9
        );
        assert_relative_eq!(spectrum.max(), expected, max_relative = 1e-9);
    }

    #[test]
    fn test_energy_preserved() {
        let size = 128;
        let transform = SpectralTransform::new(size).expect("plan");
        let window: Vec<f64> = (0..size).map(|i| ((i * 37) % 11) as f64 - 5.0).collect();

        let spectrum = transform.compute(&window).expect("FFT failed");

        let time_energy: f64 = window.iter().map(|x| x * x).sum();
        let freq_energy: f64 = spectrum.bins().iter().map(|m| m * m).sum();
        assert_relative_eq!(time_energy, freq_energy, max_relative = 1e-9);
    }

    #[test]
    fn test_zero_window_has_zero_max() {
        let transform = SpectralTransform::new(16).expect("plan");
        let spectrum = transform.compute(&[0.0; 16]).expect("FFT failed");
        assert_eq!(spectrum.max(), 0.0);
        assert_eq!(spectrum.dominant_bin(), Some(1));
    }

    #[test]
    fn test_bin_frequency() {
        let spectrum = MagnitudeSpectrum::from_magnitudes(vec![0.0; 512]);
        assert_relative_eq!(spectrum.bin_frequency(64, 256.0), 32.0);
        assert_relative_eq!(spectrum.bin_frequency(256, 256.0), 128.0);

        let empty = MagnitudeSpectrum::from_magnitudes(Vec::new());
        assert_eq!(empty.bin_frequency(3, 256.0), 0.0);
        assert_eq!(empty.dominant_bin(), None);
    }
}
