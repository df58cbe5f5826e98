//! sensor-scope: streaming sensor visualization pipeline
//!
//! Ingests a stream of integer samples and keeps two live views of it ready
//! for a renderer: a linearly detrended time series and a fixed-window
//! magnitude spectrum.
//!
//! ## Architecture
//!
//! - **Processing**: bounded sample buffer, least-squares trend, unitary FFT
//! - **Pipeline**: detrended series, spectral analyzer, controller, ingest loop
//! - **Background**: periodic publishers and their redraw notifiers
//! - **Render**: the renderer seam and axis bounds

pub mod background;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod render;

pub use config::{ConfigError, ScopeConfig};
pub use pipeline::{
    Datasource, DetrendedSeries, PipelineController, PipelineError, PipelineStats,
    SeriesSnapshot, SpectralAnalyzer, NEUTRAL_VALUE,
};
pub use processing::{MagnitudeSpectrum, Sample, TrendFit};
pub use render::{AxisBounds, PlotKind, Renderer};
