//! Pipeline Controller - owns both plot pipelines and their cadences
//!
//! ```text
//! add_sample(v) ──┬──▶ DetrendedSeries ◀── time-domain publisher (1 s) ──▶ Notifier ──▶ renderers
//!                 └──▶ SpectralAnalyzer ◀── spectral publisher    (2 s) ──▶ Notifier ──▶ renderers
//!                          │
//!                          └── every N samples, once both are ready: autoscale axis bounds
//! ```
//!
//! `add_sample` never blocks on a tick and never fails. Samples arriving
//! while the controller is stopped are counted and dropped.
//!
//! Ingest runs under the read side of an ingest gate; `start` and `stop`
//! take the write side. A fan-out therefore lands entirely before a reset or
//! entirely after it, and never in a window from another run.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::datasource::Datasource;
use super::detrended::{DetrendedSeries, SeriesSnapshot};
use super::spectral::SpectralAnalyzer;
use super::state::PipelineStats;
use super::PipelineError;
use crate::background::{Notifier, PeriodicPublisher, PublisherState, SubscriberId};
use crate::config::ScopeConfig;
use crate::processing::{MagnitudeSpectrum, Sample};
use crate::render::{AxisBounds, PlotKind, Renderer};

/// A renderer subscribed to one plot's notifier.
struct Attachment {
    plot: PlotKind,
    id: SubscriberId,
    renderer: Arc<dyn Renderer>,
}

/// Current value-axis range of both plots.
#[derive(Debug, Clone, Copy)]
struct PlotBounds {
    time_domain: AxisBounds,
    spectrum: AxisBounds,
}

impl PlotBounds {
    fn initial(config: &ScopeConfig) -> Self {
        Self {
            time_domain: config.time_domain.initial_range,
            spectrum: config.spectral.initial_range,
        }
    }

    fn get(&self, plot: PlotKind) -> AxisBounds {
        match plot {
            PlotKind::TimeDomain => self.time_domain,
            PlotKind::Spectrum => self.spectrum,
        }
    }
}

/// Orchestrates the time-domain and spectral pipelines.
pub struct PipelineController {
    config: ScopeConfig,

    time_series: Arc<DetrendedSeries>,
    spectral: Arc<SpectralAnalyzer>,

    time_notifier: Arc<Notifier>,
    spectral_notifier: Arc<Notifier>,
    time_publisher: PeriodicPublisher,
    spectral_publisher: PeriodicPublisher,

    /// Serializes start/stop.
    lifecycle: Mutex<()>,
    /// Shared by concurrent `add_sample` calls, exclusive for reset and stop.
    ingest_gate: RwLock<()>,
    running: AtomicBool,

    renderers: Mutex<Vec<Attachment>>,
    bounds: RwLock<PlotBounds>,
    /// Samples ingested since the last autoscale pass. A mutex because the
    /// threshold check, the readiness check and the reset are one step.
    since_autoscale: Mutex<usize>,

    samples_ingested: AtomicU64,
    samples_dropped: AtomicU64,
    autoscale_passes: AtomicU64,
}

impl PipelineController {
    /// Build both pipelines from a validated config. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: ScopeConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let time_series = Arc::new(DetrendedSeries::new(
            config.time_domain.title.clone(),
            config.time_domain.capacity,
        ));
        let spectral = Arc::new(SpectralAnalyzer::new(
            config.spectral.title.clone(),
            config.spectral.window_size,
        )?);

        let time_notifier = Arc::new(Notifier::new());
        let spectral_notifier = Arc::new(Notifier::new());

        let time_publisher = PeriodicPublisher::new(
            PlotKind::TimeDomain.to_string(),
            config.time_domain.publish_period(),
            time_series.clone(),
            time_notifier.clone(),
        );
        let spectral_publisher = PeriodicPublisher::new(
            PlotKind::Spectrum.to_string(),
            config.spectral.publish_period(),
            spectral.clone(),
            spectral_notifier.clone(),
        );

        info!(
            capacity = config.time_domain.capacity,
            window_size = config.spectral.window_size,
            autoscale_interval = config.autoscale.interval_samples,
            "Pipeline controller initialized"
        );

        Ok(Self {
            bounds: RwLock::new(PlotBounds::initial(&config)),
            config,
            time_series,
            spectral,
            time_notifier,
            spectral_notifier,
            time_publisher,
            spectral_publisher,
            lifecycle: Mutex::new(()),
            ingest_gate: RwLock::new(()),
            running: AtomicBool::new(false),
            renderers: Mutex::new(Vec::new()),
            since_autoscale: Mutex::new(0),
            samples_ingested: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            autoscale_passes: AtomicU64::new(0),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reset both pipelines to empty windows and start their publishers.
    ///
    /// Attached renderers are cleared and given their initial range. Calling
    /// this while already running does nothing. Outside a Tokio runtime the
    /// publishers cannot spawn and the controller stays stopped.
    pub fn start(&self) {
        let _guard = self.lifecycle.lock();
        if self.running.load(Ordering::Acquire) {
            debug!("Pipeline already running, start ignored");
            return;
        }

        let initial = PlotBounds::initial(&self.config);
        {
            let _gate = self.ingest_gate.write();
            self.time_series.reset();
            self.spectral.reset();
            *self.since_autoscale.lock() = 0;
            *self.bounds.write() = initial;
            self.running.store(true, Ordering::Release);
        }

        for (plot, renderer) in self.attachments() {
            renderer.clear();
            renderer.set_range(initial.get(plot));
        }

        let time_started = self.time_publisher.start();
        let spectral_started = self.spectral_publisher.start();
        if !(time_started && spectral_started) {
            {
                let _gate = self.ingest_gate.write();
                self.running.store(false, Ordering::Release);
            }
            self.time_publisher.stop();
            self.spectral_publisher.stop();
            warn!(
                time_started,
                spectral_started,
                "Publisher failed to start, pipeline left stopped"
            );
            return;
        }

        info!(
            time_period_ms = self.config.time_domain.publish_period_ms,
            spectral_period_ms = self.config.spectral.publish_period_ms,
            "Pipeline started"
        );
    }

    /// Stop accepting samples and ask both publishers to stop.
    ///
    /// Each publisher finishes any tick in progress and exits within one
    /// period. Calling this while stopped does nothing.
    pub fn stop(&self) {
        let _guard = self.lifecycle.lock();
        let was_running = {
            let _gate = self.ingest_gate.write();
            self.running.swap(false, Ordering::AcqRel)
        };
        if !was_running {
            debug!("Pipeline not running, stop ignored");
            return;
        }

        self.time_publisher.stop();
        self.spectral_publisher.stop();
        info!("Pipeline stop requested");
    }

    /// Stop and wait until both publisher loops have exited.
    pub async fn shutdown(&self) {
        self.stop();
        self.time_publisher.stopped().await;
        self.spectral_publisher.stopped().await;
        info!("Pipeline shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    /// Feed one sample into both pipelines.
    pub fn add_sample(&self, value: Sample) {
        let rescaled = {
            let _gate = self.ingest_gate.read();
            if !self.running.load(Ordering::Acquire) {
                self.samples_dropped.fetch_add(1, Ordering::Relaxed);
                trace!(value, "Sample dropped: pipeline not running");
                return;
            }

            self.time_series.add_sample(value);
            self.spectral.add_sample(value);
            self.samples_ingested.fetch_add(1, Ordering::Relaxed);

            self.autoscale_due().then(|| self.rescale())
        };

        // Renderers are called outside the gate so they may restart the pipeline.
        if let Some(bounds) = rescaled {
            self.push_bounds(bounds);
        }
    }

    fn autoscale_due(&self) -> bool {
        let mut since = self.since_autoscale.lock();
        *since += 1;
        if *since < self.config.autoscale.interval_samples {
            return false;
        }
        if !(self.time_series.is_ready() && self.spectral.is_ready()) {
            return false;
        }
        *since = 0;
        true
    }

    fn rescale(&self) -> PlotBounds {
        let margin = self.config.autoscale.margin;
        let bounds = PlotBounds {
            time_domain: AxisBounds::new(self.time_series.min(), self.time_series.max())
                .scaled(margin),
            spectrum: AxisBounds::new(self.spectral.min(), self.spectral.max()).scaled(margin),
        };
        *self.bounds.write() = bounds;
        bounds
    }

    fn push_bounds(&self, bounds: PlotBounds) {
        let PlotBounds {
            time_domain,
            spectrum,
        } = bounds;
        for (plot, renderer) in self.attachments() {
            let bounds = match plot {
                PlotKind::TimeDomain => time_domain,
                PlotKind::Spectrum => spectrum,
            };
            renderer.set_range(bounds);
        }

        let passes = self.autoscale_passes.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            passes,
            time_min = time_domain.min,
            time_max = time_domain.max,
            spectrum_min = spectrum.min,
            spectrum_max = spectrum.max,
            "Axis bounds rescaled"
        );
    }

    // ========================================================================
    // Renderers
    // ========================================================================

    /// Subscribe `renderer` to `plot`'s redraw notifications.
    ///
    /// Attaching the same renderer to the same plot twice returns the
    /// existing subscription. The renderer immediately receives the plot's
    /// current range.
    pub fn attach_renderer(&self, plot: PlotKind, renderer: Arc<dyn Renderer>) -> SubscriberId {
        let mut renderers = self.renderers.lock();
        if let Some(existing) = renderers
            .iter()
            .find(|a| a.plot == plot && same_renderer(&a.renderer, &renderer))
        {
            debug!(%plot, "Renderer already attached");
            return existing.id;
        }

        let target = renderer.clone();
        let id = self.notifier(plot).subscribe(move || target.redraw());
        renderers.push(Attachment {
            plot,
            id,
            renderer: renderer.clone(),
        });
        drop(renderers);

        renderer.set_range(self.bounds.read().get(plot));
        debug!(%plot, subscribers = self.notifier(plot).len(), "Renderer attached");
        id
    }

    /// Remove a renderer subscription. Returns `false` if it was unknown.
    pub fn detach_renderer(&self, id: SubscriberId) -> bool {
        let mut renderers = self.renderers.lock();
        let Some(pos) = renderers.iter().position(|a| a.id == id) else {
            return false;
        };
        let attachment = renderers.remove(pos);
        self.notifier(attachment.plot).unsubscribe(id)
    }

    fn attachments(&self) -> Vec<(PlotKind, Arc<dyn Renderer>)> {
        self.renderers
            .lock()
            .iter()
            .map(|a| (a.plot, a.renderer.clone()))
            .collect()
    }

    fn notifier(&self, plot: PlotKind) -> &Arc<Notifier> {
        match plot {
            PlotKind::TimeDomain => &self.time_notifier,
            PlotKind::Spectrum => &self.spectral_notifier,
        }
    }

    // ========================================================================
    // Read side
    // ========================================================================

    pub fn datasource(&self, plot: PlotKind) -> Arc<dyn Datasource> {
        match plot {
            PlotKind::TimeDomain => self.time_series.clone(),
            PlotKind::Spectrum => self.spectral.clone(),
        }
    }

    pub fn axis_bounds(&self, plot: PlotKind) -> AxisBounds {
        self.bounds.read().get(plot)
    }

    pub fn time_series(&self) -> SeriesSnapshot {
        self.time_series.snapshot()
    }

    pub fn spectrum(&self) -> Option<Arc<MagnitudeSpectrum>> {
        self.spectral.spectrum()
    }

    pub fn publisher_state(&self, plot: PlotKind) -> PublisherState {
        match plot {
            PlotKind::TimeDomain => self.time_publisher.state(),
            PlotKind::Spectrum => self.spectral_publisher.state(),
        }
    }

    /// Subscribers currently registered on `plot`'s notifier.
    pub fn subscriber_count(&self, plot: PlotKind) -> usize {
        self.notifier(plot).len()
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            running: self.is_running(),
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            autoscale_passes: self.autoscale_passes.load(Ordering::Relaxed),
            time_domain_ticks: self.time_publisher.ticks(),
            spectral_ticks: self.spectral_publisher.ticks(),
            spectra_computed: self.spectral.spectra_computed(),
            time_domain_buffered: self.time_series.len(),
            spectral_buffered: self.spectral.buffered(),
            time_domain_publisher: self.time_publisher.state(),
            spectral_publisher: self.spectral_publisher.state(),
        }
    }
}

fn same_renderer(a: &Arc<dyn Renderer>, b: &Arc<dyn Renderer>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingRenderer {
        redraws: AtomicUsize,
        clears: AtomicUsize,
        ranges: Mutex<Vec<AxisBounds>>,
    }

    impl Renderer for CountingRenderer {
        fn redraw(&self) {
            self.redraws.fetch_add(1, Ordering::SeqCst);
        }
        fn set_range(&self, bounds: AxisBounds) {
            self.ranges.lock().push(bounds);
        }
        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn small_config() -> ScopeConfig {
        let mut config = ScopeConfig::default();
        config.time_domain.capacity = 16;
        config.spectral.window_size = 16;
        config.autoscale.interval_samples = 16;
        config
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScopeConfig::default();
        config.spectral.window_size = 0;
        assert!(matches!(
            PipelineController::new(config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_samples_dropped_before_start() {
        let controller = PipelineController::new(small_config()).expect("controller");
        controller.add_sample(5);
        controller.add_sample(6);

        let stats = controller.stats();
        assert_eq!(stats.samples_ingested, 0);
        assert_eq!(stats.samples_dropped, 2);
        assert_eq!(stats.time_domain_buffered, 0);
        assert_eq!(stats.time_domain_publisher, PublisherState::Idle);
    }

    #[test]
    fn test_start_without_runtime_stays_stopped() {
        let controller = PipelineController::new(small_config()).expect("controller");
        controller.start();

        assert!(!controller.is_running());
        assert_eq!(
            controller.publisher_state(PlotKind::TimeDomain),
            PublisherState::Idle
        );
        controller.add_sample(1);
        assert_eq!(controller.stats().samples_dropped, 1);
        assert_eq!(controller.stats().time_domain_buffered, 0);
    }

    #[test]
    fn test_attach_is_deduplicated() {
        let controller = PipelineController::new(small_config()).expect("controller");
        let renderer: Arc<dyn Renderer> = Arc::new(CountingRenderer::default());

        let a = controller.attach_renderer(PlotKind::TimeDomain, renderer.clone());
        let b = controller.attach_renderer(PlotKind::TimeDomain, renderer.clone());
        assert_eq!(a, b);
        assert_eq!(controller.subscriber_count(PlotKind::TimeDomain), 1);

        controller.attach_renderer(PlotKind::Spectrum, renderer);
        assert_eq!(controller.subscriber_count(PlotKind::Spectrum), 1);

        assert!(controller.detach_renderer(a));
        assert!(!controller.detach_renderer(a));
        assert_eq!(controller.subscriber_count(PlotKind::TimeDomain), 0);
    }

    #[test]
    fn test_attach_pushes_current_range() {
        let controller = PipelineController::new(small_config()).expect("controller");
        let renderer = Arc::new(CountingRenderer::default());
        controller.attach_renderer(PlotKind::Spectrum, renderer.clone());

        assert_eq!(
            *renderer.ranges.lock(),
            vec![AxisBounds::new(0.0, 500.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_clears_renderers_and_accepts_samples() {
        let controller = PipelineController::new(small_config()).expect("controller");
        let renderer = Arc::new(CountingRenderer::default());
        controller.attach_renderer(PlotKind::TimeDomain, renderer.clone());

        controller.start();
        assert!(controller.is_running());
        assert_eq!(renderer.clears.load(Ordering::SeqCst), 1);

        controller.add_sample(3);
        assert_eq!(controller.stats().samples_ingested, 1);
        assert_eq!(controller.time_series().values, vec![3.0]);

        controller.shutdown().await;
        assert!(!controller.is_running());
        assert_eq!(
            controller.publisher_state(PlotKind::TimeDomain),
            PublisherState::Stopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoscale_waits_for_both_ready() {
        let mut config = small_config();
        config.autoscale.interval_samples = 4;
        let controller = PipelineController::new(config).expect("controller");
        controller.start();

        // Spectral readiness needs a published spectrum, so ingest alone
        // never autoscales.
        for v in 0..32 {
            controller.add_sample(v);
        }
        assert_eq!(controller.stats().autoscale_passes, 0);
        assert_eq!(
            controller.axis_bounds(PlotKind::TimeDomain),
            AxisBounds::new(-5_000.0, 5_000.0)
        );

        controller.shutdown().await;
    }
}
