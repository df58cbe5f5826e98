//! Windowed magnitude spectrum view
//!
//! The spectral pipeline keeps its own buffer of exactly `W` slots. A
//! refresh with a full window copies the residuals out under the window
//! lock, transforms them without holding it, and swaps the finished
//! spectrum in whole. Readers load an `Arc` of the current spectrum and so
//! never see a partially written one.
//!
//! A refresh that overlaps a [`SpectralAnalyzer::reset`] is discarded: the
//! window generation is checked again before publishing.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::datasource::Datasource;
use super::window::{TrendWindow, WindowPolicy};
use crate::processing::{MagnitudeSpectrum, ProcessingError, Sample, SpectralTransform};

pub struct SpectralAnalyzer {
    title: String,
    window: Mutex<TrendWindow>,
    transform: SpectralTransform,
    spectrum: ArcSwapOption<MagnitudeSpectrum>,
    /// Set by a refresh that published, cleared by one that saw a partial window.
    ready: AtomicBool,
    /// Window has reached `W` samples since the last reset.
    filled: AtomicBool,
    computed: AtomicU64,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("title", &self.title)
            .field("window_size", &self.window_size())
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("filled", &self.filled.load(Ordering::Acquire))
            .field("computed", &self.spectra_computed())
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Plan a transform of `window_size` points.
    pub fn new(title: impl Into<String>, window_size: usize) -> Result<Self, ProcessingError> {
        if window_size < 2 {
            return Err(ProcessingError::InvalidWindowSize(window_size));
        }
        let transform = SpectralTransform::new(window_size)?;
        Ok(Self {
            title: title.into(),
            window: Mutex::new(TrendWindow::new(window_size, WindowPolicy::FullWindow)),
            transform,
            spectrum: ArcSwapOption::empty(),
            ready: AtomicBool::new(false),
            filled: AtomicBool::new(false),
            computed: AtomicU64::new(0),
        })
    }

    /// Append and refit in one critical section.
    pub fn add_sample(&self, value: Sample) {
        let mut window = self.window.lock();
        window.push(value);
        if window.is_ready() {
            self.filled.store(true, Ordering::Release);
        }
    }

    /// Empty the window and withdraw the published spectrum.
    pub fn reset(&self) {
        let mut window = self.window.lock();
        window.clear();
        self.spectrum.store(None);
        self.ready.store(false, Ordering::Release);
        self.filled.store(false, Ordering::Release);
    }

    /// Recompute the spectrum if the window is full.
    ///
    /// Returns `true` if a new spectrum was published. A partial window
    /// keeps the previous spectrum but clears readiness.
    pub fn recompute(&self) -> bool {
        let (generation, residuals) = {
            let window = self.window.lock();
            if !window.is_ready() {
                self.ready.store(false, Ordering::Release);
                return false;
            }
            (window.generation(), window.residuals())
        };

        let spectrum = match self.transform.compute(&residuals) {
            Ok(s) => s,
            Err(e) => {
                warn!(plot = %self.title, error = %e, "Spectral transform failed");
                return false;
            }
        };

        let peak = spectrum.dominant_bin();
        let max = spectrum.max();
        {
            let window = self.window.lock();
            if window.generation() != generation {
                debug!(plot = %self.title, "Window reset during transform, spectrum discarded");
                return false;
            }
            self.spectrum.store(Some(Arc::new(spectrum)));
            self.ready.store(true, Ordering::Release);
        }
        let computed = self.computed.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(
            plot = %self.title,
            bins = self.transform.size(),
            peak_bin = ?peak,
            max,
            computed,
            "Spectrum recomputed"
        );
        true
    }

    /// The last published spectrum, if any.
    pub fn spectrum(&self) -> Option<Arc<MagnitudeSpectrum>> {
        self.spectrum.load_full()
    }

    pub fn spectra_computed(&self) -> u64 {
        self.computed.load(Ordering::Relaxed)
    }

    /// W
    pub fn window_size(&self) -> usize {
        self.transform.size()
    }

    /// Samples currently buffered (≤ W).
    pub fn buffered(&self) -> usize {
        self.window.lock().len()
    }
}

impl Datasource for SpectralAnalyzer {
    fn title(&self) -> &str {
        &self.title
    }

    /// `W` once the window has filled, before the first spectrum is out.
    fn size(&self) -> usize {
        if self.filled.load(Ordering::Acquire) {
            self.window_size()
        } else {
            1
        }
    }

    fn sample(&self, index: usize) -> Option<f64> {
        self.spectrum().and_then(|s| s.get(index))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn max(&self) -> f64 {
        self.spectrum().map_or(0.0, |s| s.max())
    }

    /// Magnitudes are non-negative.
    fn min(&self) -> f64 {
        0.0
    }

    fn refresh(&self) {
        self.recompute();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::datasource::NEUTRAL_VALUE;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sine(w: usize, bin: usize, amplitude: f64) -> impl Iterator<Item = Sample> {
        (0..w).map(move |n| {
            (amplitude * (2.0 * PI * bin as f64 * n as f64 / w as f64).sin()).round() as Sample
        })
    }

    #[test]
    fn test_rejects_degenerate_window() {
        assert!(matches!(
            SpectralAnalyzer::new("s", 1),
            Err(ProcessingError::InvalidWindowSize(1))
        ));
    }

    #[test]
    fn test_partial_window_withholds_spectrum() {
        let analyzer = SpectralAnalyzer::new("s", 64).expect("analyzer");
        for v in sine(63, 4, 1000.0) {
            analyzer.add_sample(v);
        }
        assert!(!analyzer.recompute());
        assert!(!analyzer.is_ready());
        assert!(analyzer.spectrum().is_none());
        assert_eq!(analyzer.size(), 1);
        assert_eq!(analyzer.value_at(0), NEUTRAL_VALUE);
        assert_eq!(analyzer.value_at(10), NEUTRAL_VALUE);
        assert_eq!(analyzer.max(), 0.0);
        assert_eq!(analyzer.min(), 0.0);
    }

    #[test]
    fn test_full_window_sizes_to_w_before_first_refresh() {
        let w = 16;
        let analyzer = SpectralAnalyzer::new("s", w).expect("analyzer");
        for v in 0..w as Sample {
            analyzer.add_sample(v);
            if (v as usize) < w - 1 {
                assert_eq!(analyzer.size(), 1);
            }
        }

        assert_eq!(analyzer.size(), w);
        assert!(!analyzer.is_ready());
        assert!(analyzer.spectrum().is_none());
        assert_eq!(analyzer.value_at(3), NEUTRAL_VALUE);

        analyzer.reset();
        assert_eq!(analyzer.size(), 1);
    }

    #[test]
    fn test_full_window_peaks_at_input_bin() {
        let w = 128;
        let analyzer = SpectralAnalyzer::new("s", w).expect("analyzer");
        for v in sine(w, 9, 2000.0) {
            analyzer.add_sample(v);
        }
        assert!(analyzer.recompute());
        assert!(analyzer.is_ready());
        assert_eq!(analyzer.size(), w);

        let spectrum = analyzer.spectrum().expect("spectrum");
        assert_eq!(spectrum.len(), w);
        assert!(spectrum.bins().iter().all(|m| *m >= 0.0));
        assert_eq!(spectrum.dominant_bin(), Some(9));
        assert_relative_eq!(analyzer.max(), spectrum.max());
        assert_relative_eq!(analyzer.value_at(9), spectrum.bins()[9]);
    }

    #[test]
    fn test_partial_window_after_reset_keeps_not_ready() {
        let w = 32;
        let analyzer = SpectralAnalyzer::new("s", w).expect("analyzer");
        for v in sine(w, 3, 500.0) {
            analyzer.add_sample(v);
        }
        assert!(analyzer.recompute());

        analyzer.reset();
        assert!(!analyzer.is_ready());
        assert!(analyzer.spectrum().is_none());
        assert_eq!(analyzer.buffered(), 0);

        analyzer.add_sample(1);
        assert!(!analyzer.recompute());
        assert_eq!(analyzer.spectra_computed(), 1);
    }

    #[test]
    fn test_sliding_window_recomputes_on_each_refresh() {
        let w = 16;
        let analyzer = SpectralAnalyzer::new("s", w).expect("analyzer");
        for v in 0..(w as Sample + 5) {
            analyzer.add_sample(v);
        }
        assert_eq!(analyzer.buffered(), w);
        analyzer.refresh();
        analyzer.refresh();
        assert_eq!(analyzer.spectra_computed(), 2);

        // A pure ramp detrends to zero
        let spectrum = analyzer.spectrum().expect("spectrum");
        assert!(spectrum.max() < 1e-9);
    }
}
