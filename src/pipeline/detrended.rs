//! Detrended time-domain view
//!
//! Every read detrends each sample at its own position using the fit that
//! was current when the read took the window lock.

use parking_lot::Mutex;
use serde::Serialize;

use super::datasource::Datasource;
use super::window::{TrendWindow, WindowPolicy};
use crate::processing::{Sample, TrendFit};

/// All detrended points and their extremes, read under one lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub values: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub fit: TrendFit,
}

impl SeriesSnapshot {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Time-domain pipeline: bounded buffer of capacity C, detrended on read.
#[derive(Debug)]
pub struct DetrendedSeries {
    title: String,
    window: Mutex<TrendWindow>,
}

impl DetrendedSeries {
    pub fn new(title: impl Into<String>, capacity: usize) -> Self {
        Self {
            title: title.into(),
            window: Mutex::new(TrendWindow::new(capacity, WindowPolicy::AnySamples)),
        }
    }

    /// Append and refit in one critical section.
    pub fn add_sample(&self, value: Sample) {
        self.window.lock().push(value);
    }

    /// Empty the buffer and drop the fit.
    pub fn reset(&self) {
        self.window.lock().clear();
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        let (values, fit) = {
            let window = self.window.lock();
            (window.detrended_values(), window.fit())
        };
        let (min, max) = extremes(&values);
        SeriesSnapshot {
            values,
            min,
            max,
            fit,
        }
    }

    pub fn fit(&self) -> TrendFit {
        self.window.lock().fit()
    }

    /// Buffered samples; unlike [`Datasource::size`] this may be zero.
    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window.lock().capacity()
    }
}

/// `(min, max)` of `values`, `(0, 0)` when empty.
fn extremes(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

impl Datasource for DetrendedSeries {
    fn title(&self) -> &str {
        &self.title
    }

    fn size(&self) -> usize {
        self.window.lock().len().max(1)
    }

    fn sample(&self, index: usize) -> Option<f64> {
        self.window.lock().detrended(index)
    }

    fn is_ready(&self) -> bool {
        self.window.lock().is_ready()
    }

    fn max(&self) -> f64 {
        extremes(&self.window.lock().detrended_values()).1
    }

    fn min(&self) -> f64 {
        extremes(&self.window.lock().detrended_values()).0
    }
}
