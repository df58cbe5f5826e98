//! Signal processing primitives - bounded buffer, linear trend, magnitude spectrum

mod buffer;
mod fft;
mod trend;

pub use buffer::{Sample, SampleBuffer};
pub use fft::{MagnitudeSpectrum, SpectralTransform};
pub use trend::{TrendEstimator, TrendFit};

use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Invalid window size: {0}")]
    InvalidWindowSize(usize),
}
