//! Periodic Publisher: fixed-cadence refresh and "data ready" broadcast
//!
//! Each tick refreshes one datasource and then notifies its subscribers.
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──▶ Stopping ──(loop exits)──▶ Stopped
//!                      ▲                                              │
//!                      └──────────────────start()─────────────────────┘
//! ```
//!
//! `stop()` only requests cancellation. A tick that is already refreshing
//! runs to completion, so a stop takes effect within one period. A restart
//! issued while the old loop is still draining waits for it to exit before
//! the new loop ticks, so at most one loop per publisher ever runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::notifier::Notifier;
use crate::pipeline::Datasource;

/// Lifecycle of a publisher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublisherState {
    /// Never started
    Idle,
    /// Loop is ticking
    Running,
    /// Stop requested, loop has not observed it yet
    Stopping,
    /// Loop has exited
    Stopped,
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherState::Idle => write!(f, "IDLE"),
            PublisherState::Running => write!(f, "RUNNING"),
            PublisherState::Stopping => write!(f, "STOPPING"),
            PublisherState::Stopped => write!(f, "STOPPED"),
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: PublisherState,
    /// Bumped on every start so a draining loop cannot overwrite the state
    /// of its successor.
    generation: u64,
}

struct ActiveRun {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background cadence for one datasource.
pub struct PeriodicPublisher {
    name: String,
    period: Duration,
    source: Arc<dyn Datasource>,
    notifier: Arc<Notifier>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    run: Mutex<Option<ActiveRun>>,
    ticks: Arc<AtomicU64>,
}

impl PeriodicPublisher {
    pub fn new(
        name: impl Into<String>,
        period: Duration,
        source: Arc<dyn Datasource>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            source,
            notifier,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: PublisherState::Idle,
                generation: 0,
            })),
            run: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begin ticking. No-op if already running.
    ///
    /// Must be called from within a Tokio runtime; outside one the call is
    /// logged and ignored. Returns `true` if a new loop was spawned.
    pub fn start(&self) -> bool {
        let mut run = self.run.lock();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(publisher = %self.name, error = %e, "Cannot start publisher outside a Tokio runtime");
                return false;
            }
        };

        let generation = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == PublisherState::Running {
                debug!(publisher = %self.name, "Publisher already running, start ignored");
                return false;
            }
            lifecycle.state = PublisherState::Running;
            lifecycle.generation += 1;
            lifecycle.generation
        };

        let previous = run.take().map(|r| r.handle);
        let cancel_token = CancellationToken::new();

        let task = TickLoop {
            name: self.name.clone(),
            period: self.period,
            source: Arc::clone(&self.source),
            notifier: Arc::clone(&self.notifier),
            lifecycle: Arc::clone(&self.lifecycle),
            ticks: Arc::clone(&self.ticks),
            cancel_token: cancel_token.clone(),
            generation,
        };
        let handle = runtime.spawn(task.run(previous));

        *run = Some(ActiveRun {
            cancel_token,
            handle,
        });
        true
    }

    /// Request the loop to stop. No-op unless running.
    ///
    /// Returns immediately; the loop exits within one period.
    pub fn stop(&self) -> bool {
        let run = self.run.lock();
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != PublisherState::Running {
            debug!(publisher = %self.name, state = %lifecycle.state, "Publisher not running, stop ignored");
            return false;
        }
        lifecycle.state = PublisherState::Stopping;
        if let Some(active) = run.as_ref() {
            active.cancel_token.cancel();
        }
        info!(publisher = %self.name, "Publisher stop requested");
        true
    }

    /// Wait until a stopped loop has fully exited.
    ///
    /// Returns immediately if the publisher is running or was never started.
    pub async fn stopped(&self) {
        let handle = {
            let mut run = self.run.lock();
            let state = self.lifecycle.lock().state;
            if state == PublisherState::Running {
                return;
            }
            run.take().map(|r| r.handle)
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(publisher = %self.name, error = %e, "Publisher task ended abnormally");
            }
        }
    }

    pub fn state(&self) -> PublisherState {
        self.lifecycle.lock().state
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PeriodicPublisher {
    fn drop(&mut self) {
        if let Some(active) = self.run.get_mut().as_ref() {
            active.cancel_token.cancel();
        }
    }
}

/// State moved into the spawned task.
struct TickLoop {
    name: String,
    period: Duration,
    source: Arc<dyn Datasource>,
    notifier: Arc<Notifier>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    ticks: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    generation: u64,
}

impl TickLoop {
    async fn run(self, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            // Predecessor was already cancelled; let it finish its last tick.
            if let Err(e) = previous.await {
                error!(publisher = %self.name, error = %e, "Previous publisher task ended abnormally");
            }
        }

        info!(
            publisher = %self.name,
            period_ms = self.period.as_millis() as u64,
            "Publisher started"
        );

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                _ = interval.tick() => {}
            }

            self.source.refresh();
            let delivered = self.notifier.notify();
            let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

            trace!(
                publisher = %self.name,
                tick,
                subscribers = delivered,
                ready = self.source.is_ready(),
                "Published"
            );
        }

        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.generation == self.generation {
                lifecycle.state = PublisherState::Stopped;
            }
        }

        info!(publisher = %self.name, "Publisher stopped");
    }
}
