//! Pipeline Statistics
//!
//! Point-in-time counters for one [`super::PipelineController`], suitable for
//! periodic logging or a JSON status dump.

use serde::{Deserialize, Serialize};

use crate::background::PublisherState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Whether the controller is currently started
    pub running: bool,
    /// Samples fanned out to both pipelines
    pub samples_ingested: u64,
    /// Samples received while stopped
    pub samples_dropped: u64,
    /// Axis autoscale passes performed
    pub autoscale_passes: u64,
    /// Time-domain publisher ticks
    pub time_domain_ticks: u64,
    /// Spectral publisher ticks
    pub spectral_ticks: u64,
    /// Spectra actually published (full windows only)
    pub spectra_computed: u64,
    /// Samples currently in the time-domain buffer
    pub time_domain_buffered: usize,
    /// Samples currently in the spectral window
    pub spectral_buffered: usize,
    pub time_domain_publisher: PublisherState,
    pub spectral_publisher: PublisherState,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} samples ({} dropped), {} autoscale passes, {} spectra over {} ticks, buffers {}/{}",
            self.samples_ingested,
            self.samples_dropped,
            self.autoscale_passes,
            self.spectra_computed,
            self.spectral_ticks,
            self.time_domain_buffered,
            self.spectral_buffered
        )
    }
}
