//! sensor-scope - live detrended and spectral views of a sample stream
//!
//! Without a display attached, each plot redraw is logged: the series
//! extremes for the time-domain view and the dominant frequency for the
//! spectrum.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic 10 Hz tone with drift and noise at 250 samples/s
//! sensor-scope --synthetic
//!
//! # One integer per line on stdin
//! sensor-bridge | sensor-scope --stdin
//!
//! # Replay a recording, 4 ms between samples
//! sensor-scope --file recording.csv --delay-ms 4
//! ```
//!
//! # Environment Variables
//!
//! - `SCOPE_CONFIG`: Path to a `scope_config.toml`
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sensor_scope::config::ScopeConfig;
use sensor_scope::pipeline::processing_loop::{IngestLoop, IngestOutcome};
use sensor_scope::pipeline::source::{
    load_samples_file, ReplaySource, SampleSource, StdinSource, SyntheticSignal, SyntheticSource,
};
use sensor_scope::{AxisBounds, Datasource, PipelineController, PlotKind, Renderer};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensor-scope")]
#[command(about = "Detrended time series and live spectrum of a sensor sample stream")]
#[command(version)]
struct CliArgs {
    /// Read samples from stdin, one integer per line
    #[arg(long, conflicts_with_all = ["file", "synthetic"])]
    stdin: bool,

    /// Replay samples from a text/CSV file (first column)
    #[arg(long, value_name = "PATH", conflicts_with = "synthetic")]
    file: Option<PathBuf>,

    /// Generate a synthetic tone with drift and noise (default input)
    #[arg(long)]
    synthetic: bool,

    /// Synthetic sample rate in Hz
    #[arg(long, default_value_t = 250.0)]
    rate: f64,

    /// Synthetic tone frequency in Hz
    #[arg(long, default_value_t = 10.0)]
    tone: f64,

    /// Delay between replayed samples in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Path to scope_config.toml (overrides SCOPE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

// ============================================================================
// Log Renderer
// ============================================================================

/// Stands in for a plot: re-reads its datasource on every redraw and logs
/// what a display would show.
struct LogRenderer {
    plot: PlotKind,
    source: Arc<dyn Datasource>,
    sample_rate_hz: f64,
    range: Mutex<Option<AxisBounds>>,
}

impl LogRenderer {
    fn new(plot: PlotKind, source: Arc<dyn Datasource>, sample_rate_hz: f64) -> Self {
        Self {
            plot,
            source,
            sample_rate_hz,
            range: Mutex::new(None),
        }
    }

    /// Strongest non-DC bin in the positive half, read through the datasource.
    fn dominant_bin(&self) -> Option<(usize, f64)> {
        let size = self.source.size();
        (1..=size / 2)
            .filter_map(|i| self.source.sample(i).map(|m| (i, m)))
            .fold(None, |best: Option<(usize, f64)>, (i, m)| match best {
                Some((_, best_m)) if best_m >= m => best,
                _ => Some((i, m)),
            })
    }
}

impl Renderer for LogRenderer {
    fn redraw(&self) {
        if !self.source.is_ready() {
            info!(plot = %self.plot, title = self.source.title(), "Waiting for data");
            return;
        }
        let range = *self.range.lock();
        match self.plot {
            PlotKind::TimeDomain => info!(
                plot = %self.plot,
                points = self.source.size(),
                min = self.source.min(),
                max = self.source.max(),
                range = ?range,
                "Redraw"
            ),
            PlotKind::Spectrum => {
                let size = self.source.size();
                let peak = self.dominant_bin();
                info!(
                    plot = %self.plot,
                    bins = size,
                    peak_bin = ?peak.map(|(bin, _)| bin),
                    peak_hz = ?peak.map(|(bin, _)| bin as f64 * self.sample_rate_hz / size as f64),
                    peak_magnitude = ?peak.map(|(_, m)| m),
                    range = ?range,
                    "Redraw"
                );
            }
        }
    }

    fn set_range(&self, bounds: AxisBounds) {
        *self.range.lock() = Some(bounds);
    }

    fn clear(&self) {
        *self.range.lock() = None;
    }
}

// ============================================================================
// Main
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> Result<ScopeConfig> {
    match path {
        Some(p) => ScopeConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(ScopeConfig::load()),
    }
}

fn build_source(args: &CliArgs, config: &ScopeConfig) -> Result<Box<dyn SampleSource>> {
    if args.stdin {
        info!("Input: stdin (one sample per line)");
        return Ok(Box::new(StdinSource::new()));
    }

    if let Some(path) = &args.file {
        let samples = load_samples_file(path)?;
        if samples.is_empty() {
            return Err(anyhow::anyhow!("No samples found in {}", path.display()));
        }
        info!(
            path = %path.display(),
            samples = samples.len(),
            delay_ms = args.delay_ms,
            "Input: file replay"
        );
        return Ok(Box::new(ReplaySource::new(
            samples,
            Duration::from_millis(args.delay_ms),
        )));
    }

    if !(args.rate.is_finite() && args.rate > 0.0) {
        return Err(anyhow::anyhow!("--rate must be > 0 (got {})", args.rate));
    }
    if (args.rate - config.spectral.sample_rate_hz).abs() > f64::EPSILON {
        warn!(
            rate = args.rate,
            configured = config.spectral.sample_rate_hz,
            "Synthetic rate differs from spectral.sample_rate_hz; frequency labels use the config value"
        );
    }
    let signal = SyntheticSignal {
        frequency_hz: args.tone,
        ..SyntheticSignal::default()
    };
    info!(rate_hz = args.rate, tone_hz = args.tone, "Input: synthetic");
    Ok(Box::new(SyntheticSource::new(signal, args.rate)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let config = load_config(args.config.as_ref())?;
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let controller = Arc::new(PipelineController::new(config.clone())?);
    let sample_rate_hz = config.spectral.sample_rate_hz;
    for plot in [PlotKind::TimeDomain, PlotKind::Spectrum] {
        let renderer = Arc::new(LogRenderer::new(
            plot,
            controller.datasource(plot),
            sample_rate_hz,
        ));
        controller.attach_renderer(plot, renderer);
    }

    let mut source = build_source(&args, &config)?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    controller.start();
    let report = IngestLoop::new(controller.clone(), cancel_token.clone())
        .with_progress(config.autoscale.interval_samples as u64)
        .run(source.as_mut())
        .await;

    // Let the slower cadence publish the final window once before stopping.
    if report.outcome == IngestOutcome::Exhausted {
        tokio::select! {
            _ = cancel_token.cancelled() => {}
            _ = tokio::time::sleep(config.spectral.publish_period()) => {}
        }
    }
    controller.shutdown().await;

    let stats = controller.stats();
    if args.json {
        let stats_json = serde_json::to_string(&stats)?;
        info!(
            samples_read = report.samples_read,
            outcome = ?report.outcome,
            stats = %stats_json,
            "Final statistics"
        );
    } else {
        info!(
            samples_read = report.samples_read,
            outcome = ?report.outcome,
            "{}",
            stats
        );
    }
    if report.outcome == IngestOutcome::SourceFailed {
        return Err(anyhow::anyhow!("Sample source failed"));
    }
    Ok(())
}
