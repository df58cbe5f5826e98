//! Ingest loop shared by every input mode.
//!
//! Pulls samples from a [`SampleSource`] and hands each one to the
//! controller until the source is exhausted, fails, or the cancellation
//! token fires.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{SampleEvent, SampleSource};
use super::PipelineController;

/// Why an ingest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Source reported end of data
    Exhausted,
    /// Cancellation token fired
    Cancelled,
    /// Source returned an unrecoverable error
    SourceFailed,
}

/// Result of one [`IngestLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub samples_read: u64,
    pub outcome: IngestOutcome,
}

/// Feeds one source into a [`PipelineController`].
pub struct IngestLoop {
    controller: Arc<PipelineController>,
    cancel_token: CancellationToken,
    /// Log progress every this many samples (0 disables)
    progress_every: u64,
}

impl IngestLoop {
    pub fn new(controller: Arc<PipelineController>, cancel_token: CancellationToken) -> Self {
        Self {
            controller,
            cancel_token,
            progress_every: 0,
        }
    }

    /// Emit a debug progress line every `n` samples.
    pub fn with_progress(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    /// Run until the source ends or cancellation.
    pub async fn run<S: SampleSource + ?Sized>(self, source: &mut S) -> IngestReport {
        let mut samples_read = 0u64;
        info!(source = source.source_name(), "Ingesting samples");

        let outcome = loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Ingest cancelled");
                    break IngestOutcome::Cancelled;
                }
                result = source.next_sample() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!(source = source.source_name(), error = %e, "Sample source failed");
                        break IngestOutcome::SourceFailed;
                    }
                }
            };

            match event {
                SampleEvent::Sample(v) => {
                    self.controller.add_sample(v);
                    samples_read += 1;
                    if self.progress_every > 0 && samples_read % self.progress_every == 0 {
                        debug!(samples_read, "Ingest progress");
                    }
                }
                SampleEvent::Eof => {
                    info!(samples_read, "Sample source reached end");
                    break IngestOutcome::Exhausted;
                }
            }
        };

        IngestReport {
            samples_read,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use crate::pipeline::source::ReplaySource;
    use std::time::Duration;

    fn controller() -> Arc<PipelineController> {
        let mut config = ScopeConfig::default();
        config.time_domain.capacity = 8;
        config.spectral.window_size = 8;
        Arc::new(PipelineController::new(config).expect("controller"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_source_to_eof() {
        let controller = controller();
        controller.start();

        let mut source = ReplaySource::new((0..20).collect(), Duration::ZERO);
        let report = IngestLoop::new(controller.clone(), CancellationToken::new())
            .run(&mut source)
            .await;

        assert_eq!(report.outcome, IngestOutcome::Exhausted);
        assert_eq!(report.samples_read, 20);
        assert_eq!(controller.stats().samples_ingested, 20);
        assert_eq!(controller.stats().time_domain_buffered, 8);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_ingest() {
        let controller = controller();
        controller.start();
        let token = CancellationToken::new();

        let mut source = ReplaySource::new((0..1_000).collect(), Duration::from_millis(10));
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(55)).await;
            canceller.cancel();
        });

        let report = IngestLoop::new(controller.clone(), token).run(&mut source).await;
        assert_eq!(report.outcome, IngestOutcome::Cancelled);
        assert!(report.samples_read < 1_000);
        controller.shutdown().await;
    }
}
