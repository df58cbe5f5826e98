//! System-wide default constants.
//!
//! Centralises the construction-time parameters of both plot pipelines.
//! Grouped by pipeline for easy discovery.

// ============================================================================
// Time-Domain Pipeline
// ============================================================================

/// Sample buffer capacity for the detrended time series (samples).
pub const TIME_DOMAIN_CAPACITY: usize = 512;

/// Publish cadence of the time-domain view (milliseconds).
pub const TIME_DOMAIN_PERIOD_MS: u64 = 1_000;

/// Plot title for the time-domain view.
pub const TIME_DOMAIN_TITLE: &str = "Temporal EEG";

/// Fixed range shown before the first autoscale pass.
pub const TIME_DOMAIN_INITIAL_RANGE: (f64, f64) = (-5_000.0, 5_000.0);

// ============================================================================
// Spectral Pipeline
// ============================================================================

/// Spectral window size W (samples). Also the spectral buffer capacity.
pub const SPECTRAL_WINDOW_SIZE: usize = 512;

/// Publish cadence of the spectral view (milliseconds).
///
/// Slower than the time-domain view; the transform is the heavier job.
pub const SPECTRAL_PERIOD_MS: u64 = 2_000;

/// Plot title for the spectral view.
pub const SPECTRAL_TITLE: &str = "Fast Fourier Transform EEG";

/// Fixed range shown before the first autoscale pass.
pub const SPECTRAL_INITIAL_RANGE: (f64, f64) = (0.0, 500.0);

/// Sampling rate used to label bins in Hz.
pub const SAMPLE_RATE_HZ: f64 = 250.0;

// ============================================================================
// Autoscale
// ============================================================================

/// Samples ingested between autoscale passes.
pub const AUTOSCALE_INTERVAL_SAMPLES: usize = 512;

/// Multiplier applied to both extremes when recomputing axis bounds.
pub const AUTOSCALE_MARGIN: f64 = 1.1;

// ============================================================================
// Sentinels
// ============================================================================

/// Value reported for empty buffers, out-of-range indices and missing spectra.
///
/// Also the reported size of an empty view, so renderers always have one
/// point to draw.
pub const NEUTRAL_VALUE: f64 = 1.0;
