//! Sample source abstraction for pipeline ingestion.
//!
//! Acquisition hardware is outside this crate; anything that can hand over
//! a stream of integer samples implements [`SampleSource`]: a pre-loaded
//! replay, stdin (one integer per line), or a synthetic generator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

use crate::processing::Sample;

/// Events produced by a sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEvent {
    /// One sample was read.
    Sample(Sample),
    /// No more data will arrive.
    Eof,
}

/// Where samples come from.
///
/// The ingest loop calls [`next_sample`](SampleSource::next_sample) inside a
/// `select!` with cancellation, so implementations may await freely.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next sample.
    ///
    /// Returns `SampleEvent::Eof` when the source is exhausted and `Err` on
    /// unrecoverable read errors.
    async fn next_sample(&mut self) -> Result<SampleEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Line Parsing
// ============================================================================

/// Parse the first field of a text/CSV line as a sample.
///
/// Fields are split on commas, semicolons and whitespace. Returns `None` for
/// blank lines, `#` comments and lines whose first field is not an integer
/// (such as a header). Decimal values are rounded to the nearest integer.
pub fn parse_sample_line(line: &str) -> Option<Sample> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let field = trimmed
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .find(|f| !f.is_empty())?;

    if let Ok(v) = field.parse::<Sample>() {
        return Some(v);
    }
    let v = field.parse::<f64>().ok()?;
    if v.is_finite() && v >= f64::from(Sample::MIN) && v <= f64::from(Sample::MAX) {
        Some(v.round() as Sample)
    } else {
        None
    }
}

/// Read every sample from a text or CSV file.
///
/// A leading header line is skipped; other unparseable lines are logged and
/// skipped.
pub fn load_samples_file(path: &Path) -> Result<Vec<Sample>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open sample file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {line_num}"))?;
        match parse_sample_line(&line) {
            Some(v) => samples.push(v),
            None if line_num == 1 || line.trim().is_empty() || line.trim_start().starts_with('#') => {}
            None => warn!(line = line_num, content = %line.trim(), "Skipping unparseable sample line"),
        }
    }
    Ok(samples)
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded samples with an optional delay between them.
pub struct ReplaySource {
    samples: std::vec::IntoIter<Sample>,
    delay: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<Sample>, delay: Duration) -> Self {
        Self {
            samples: samples.into_iter(),
            delay,
            yielded_first: false,
        }
    }

    /// Samples not yet yielded.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.samples.next() {
            Some(v) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(v))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (one integer per line)
// ============================================================================

/// Reads samples from stdin, one per line.
///
/// `sensor-bridge | sensor-scope --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(64),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match parse_sample_line(line) {
                Some(v) => return Ok(SampleEvent::Sample(v)),
                None => warn!(line = %line, "Skipping unparseable sample"),
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// Shape of the generated signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSignal {
    /// Tone frequency in Hz
    pub frequency_hz: f64,
    /// Tone amplitude in sample units
    pub amplitude: f64,
    /// Linear drift added per sample
    pub drift_per_sample: f64,
    /// Constant offset
    pub offset: f64,
    /// Peak uniform noise in sample units
    pub noise: f64,
}

impl Default for SyntheticSignal {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            amplitude: 400.0,
            drift_per_sample: 0.5,
            offset: 0.0,
            noise: 25.0,
        }
    }
}

/// Generates `offset + drift·n + A·sin(2π·f·n/fs) + noise` at `fs` samples
/// per second.
pub struct SyntheticSource {
    signal: SyntheticSignal,
    sample_rate_hz: f64,
    rng: StdRng,
    /// `None` when unpaced
    period: Option<Duration>,
    /// Created on first read so construction needs no runtime.
    pacing: Option<Interval>,
    emitted: u64,
    limit: Option<u64>,
}

impl SyntheticSource {
    /// Paced generator at `sample_rate_hz` (must be > 0).
    pub fn new(signal: SyntheticSignal, sample_rate_hz: f64) -> Self {
        Self {
            signal,
            sample_rate_hz,
            rng: StdRng::from_entropy(),
            period: Some(sample_period(sample_rate_hz)),
            pacing: None,
            emitted: 0,
            limit: None,
        }
    }

    /// Deterministic noise.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// End with [`SampleEvent::Eof`] after `count` samples.
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Generate as fast as the consumer pulls.
    pub fn unpaced(mut self) -> Self {
        self.period = None;
        self.pacing = None;
        self
    }

    /// Value of sample `n` without noise.
    pub fn clean_value(&self, n: u64) -> f64 {
        let s = &self.signal;
        let t = n as f64 / self.sample_rate_hz;
        s.offset + s.drift_per_sample * n as f64 + s.amplitude * (TAU * s.frequency_hz * t).sin()
    }

    fn generate(&mut self) -> Sample {
        let mut v = self.clean_value(self.emitted);
        if self.signal.noise > 0.0 {
            v += self.rng.gen_range(-self.signal.noise..=self.signal.noise);
        }
        v.round()
            .clamp(f64::from(Sample::MIN), f64::from(Sample::MAX)) as Sample
    }
}

/// `1/fs`, never zero.
fn sample_period(sample_rate_hz: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / sample_rate_hz)
        .unwrap_or(Duration::from_secs(1))
        .max(Duration::from_micros(1))
}

#[async_trait]
impl SampleSource for SyntheticSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return Ok(SampleEvent::Eof);
        }
        if let Some(period) = self.period {
            let pacing = self.pacing.get_or_insert_with(|| {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
                interval
            });
            pacing.tick().await;
        }
        let v = self.generate();
        self.emitted += 1;
        Ok(SampleEvent::Sample(v))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_sample_line() {
        assert_eq!(parse_sample_line("42"), Some(42));
        assert_eq!(parse_sample_line("  -17  "), Some(-17));
        assert_eq!(parse_sample_line("120,5,ch1"), Some(120));
        assert_eq!(parse_sample_line("7\t8"), Some(7));
        assert_eq!(parse_sample_line("12.6"), Some(13));
        assert_eq!(parse_sample_line("value,channel"), None);
        assert_eq!(parse_sample_line("# comment"), None);
        assert_eq!(parse_sample_line(""), None);
        assert_eq!(parse_sample_line("1e12"), None);
    }

    #[test]
    fn test_load_samples_file_skips_header() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "sample,channel").expect("write");
        writeln!(file, "10,0").expect("write");
        writeln!(file).expect("write");
        writeln!(file, "garbage").expect("write");
        writeln!(file, "-20,0").expect("write");

        let samples = load_samples_file(file.path()).expect("load");
        assert_eq!(samples, vec![10, -20]);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = load_samples_file(Path::new("/nonexistent/samples.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[tokio::test]
    async fn test_replay_source_yields_then_eof() {
        let mut source = ReplaySource::new(vec![1, 2], Duration::ZERO);
        assert_eq!(source.next_sample().await.expect("read"), SampleEvent::Sample(1));
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.next_sample().await.expect("read"), SampleEvent::Sample(2));
        assert_eq!(source.next_sample().await.expect("read"), SampleEvent::Eof);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_delay_is_between_samples() {
        let mut source = ReplaySource::new(vec![1, 2], Duration::from_millis(100));
        let start = tokio::time::Instant::now();
        source.next_sample().await.expect("read");
        assert_eq!(start.elapsed(), Duration::ZERO);
        source.next_sample().await.expect("read");
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_synthetic_without_noise_matches_formula() {
        let signal = SyntheticSignal {
            noise: 0.0,
            ..SyntheticSignal::default()
        };
        let mut source = SyntheticSource::new(signal, 250.0).unpaced().with_limit(3);
        for n in 0..3 {
            let expected = source.clean_value(n).round() as Sample;
            assert_eq!(source.next_sample().await.expect("read"), SampleEvent::Sample(expected));
        }
        assert_eq!(source.next_sample().await.expect("read"), SampleEvent::Eof);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_pacing_follows_rate() {
        let mut source = SyntheticSource::new(SyntheticSignal::default(), 100.0).with_seed(1);
        let start = tokio::time::Instant::now();
        for _ in 0..11 {
            source.next_sample().await.expect("read");
        }
        // First tick is immediate, then one every 10 ms
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_synthetic_seed_is_deterministic() {
        let mut a = SyntheticSource::new(SyntheticSignal::default(), 250.0)
            .unpaced()
            .with_seed(7);
        let mut b = SyntheticSource::new(SyntheticSignal::default(), 250.0)
            .unpaced()
            .with_seed(7);
        for _ in 0..16 {
            assert_eq!(
                a.next_sample().await.expect("read"),
                b.next_sample().await.expect("read")
            );
        }
    }
}
