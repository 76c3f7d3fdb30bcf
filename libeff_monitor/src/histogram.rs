use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use super::error::HistogramError;

/// An inclusive range of 1-based bin indices. Bin 0 is underflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinRange {
    pub first: usize,
    pub last: usize,
}

impl BinRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }
}

/// A 2-D histogram as stored in the DQM archives.
///
/// The bin matrix includes the underflow and overflow bins on both axes, so a histogram
/// with nx by ny bins is backed by an (nx+2) x (ny+2) array.
#[derive(Debug, Clone)]
pub struct Hist2D {
    bins: Array2<f64>,
}

impl Hist2D {
    /// Wrap a bin matrix; name only labels the error if the shape is too small
    pub fn new(name: &str, bins: Array2<f64>) -> Result<Self, HistogramError> {
        let (rows, cols) = bins.dim();
        if rows < 3 || cols < 3 {
            return Err(HistogramError::BadShape(name.to_string(), rows, cols));
        }
        Ok(Self { bins })
    }

    pub fn n_bins_x(&self) -> usize {
        self.bins.nrows() - 2
    }

    pub fn n_bins_y(&self) -> usize {
        self.bins.ncols() - 2
    }

    /// Sum of bin contents over the rectangle spanned by two inclusive bin ranges.
    ///
    /// Ranges reaching past the overflow bin are clamped to it, and an empty range
    /// integrates to zero.
    pub fn integral(&self, x: BinRange, y: BinRange) -> f64 {
        let x_last = x.last.min(self.n_bins_x() + 1);
        let y_last = y.last.min(self.n_bins_y() + 1);
        if x.first > x_last || y.first > y_last {
            return 0.0;
        }
        self.bins
            .slice(s![x.first..=x_last, y.first..=y_last])
            .sum()
    }
}
