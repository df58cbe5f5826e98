//! Renderer collaborator seam
//!
//! Drawing is out of scope for this crate. A renderer only needs to redraw
//! when told to, accept new axis bounds, and clear itself when the pipeline
//! restarts. After a redraw it re-reads its datasource.

use serde::{Deserialize, Serialize};

/// Which of the two views a renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    /// Detrended time series
    TimeDomain,
    /// Windowed magnitude spectrum
    Spectrum,
}

impl std::fmt::Display for PlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotKind::TimeDomain => write!(f, "time-domain"),
            PlotKind::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// Fixed range of a plot's value axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl AxisBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `[min·margin, max·margin]`
    pub fn scaled(self, margin: f64) -> Self {
        Self {
            min: self.min * margin,
            max: self.max * margin,
        }
    }
}

/// A plot that can be told to repaint.
///
/// `redraw` is delivered on the publisher's task right after the datasource
/// was refreshed, so reads made from inside it see the fresh state.
pub trait Renderer: Send + Sync {
    fn redraw(&self);

    /// Replace the value-axis range.
    fn set_range(&self, _bounds: AxisBounds) {}

    /// Drop everything drawn so far.
    fn clear(&self) {}
}
