//! Plot Pipelines
//!
//! ```text
//! SampleSource ──▶ IngestLoop ──▶ PipelineController::add_sample
//!                                   ├──▶ DetrendedSeries   (buffer C, detrend on read)
//!                                   └──▶ SpectralAnalyzer  (window W, FFT on tick)
//! ```
//!
//! Each pipeline owns its window behind its own lock; nothing is shared
//! between them except the incoming sample stream.

mod controller;
mod datasource;
mod detrended;
mod spectral;
mod state;
mod window;
pub mod processing_loop;
pub mod source;

pub use controller::PipelineController;
pub use datasource::{Datasource, NEUTRAL_VALUE};
pub use detrended::{DetrendedSeries, SeriesSnapshot};
pub use spectral::SpectralAnalyzer;
pub use state::PipelineStats;
pub use window::{TrendWindow, WindowPolicy};

use thiserror::Error;

use crate::config::ConfigError;
use crate::processing::ProcessingError;

/// Errors building a pipeline. Running pipelines never fail.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Spectral setup failed: {0}")]
    Processing(#[from] ProcessingError),
}
