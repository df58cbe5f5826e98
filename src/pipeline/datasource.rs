//! Datasource capability shared by both plot views
//!
//! A renderer only ever talks to a plot through this trait. Reads are
//! permissive: an out-of-range index or missing data yields
//! [`NEUTRAL_VALUE`] from [`Datasource::value_at`] instead of failing, and
//! [`Datasource::size`] never reports zero points.

pub use crate::config::defaults::NEUTRAL_VALUE;

/// Read side of one plot pipeline.
pub trait Datasource: Send + Sync {
    /// Plot title.
    fn title(&self) -> &str;

    /// Number of plottable points; `1` when there is nothing to plot.
    fn size(&self) -> usize;

    /// Value at `index`, or `None` if there is no data there.
    fn sample(&self, index: usize) -> Option<f64>;

    /// Value at `index`, or [`NEUTRAL_VALUE`] if there is no data there.
    fn value_at(&self, index: usize) -> f64 {
        self.sample(index).unwrap_or(NEUTRAL_VALUE)
    }

    /// Whether the current output is meaningful rather than a placeholder.
    fn is_ready(&self) -> bool;

    fn max(&self) -> f64;

    fn min(&self) -> f64;

    /// Recompute derived state. Called by the publisher once per tick.
    fn refresh(&self) {}
}
