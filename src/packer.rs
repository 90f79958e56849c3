use crate::types::{Kerf, LENGTH_EPSILON};

/// One stock bar being filled with pieces.
#[derive(Debug, Clone, PartialEq)]
pub struct BarBin {
    pub stock_length: f64,
    pub lengths: Vec<f64>,
    pub remaining: f64,
    pub upsized: bool,
}

impl BarBin {
    pub fn new(stock_length: f64) -> Self {
        Self {
            stock_length,
            lengths: Vec::new(),
            remaining: stock_length,
            upsized: false,
        }
    }

    /// Synthetic bar for a piece longer than every stock length.
    pub fn upsized(stock_length: f64) -> Self {
        Self {
            upsized: true,
            ..Self::new(stock_length)
        }
    }

    pub fn used_length(&self) -> f64 {
        self.lengths.iter().sum()
    }

    pub fn efficiency(&self) -> f64 {
        if self.stock_length <= 0.0 {
            return 0.0;
        }
        self.used_length() / self.stock_length
    }

    /// Capacity left after placing `length` next, or `None` if it does not fit.
    pub fn leftover_after(&self, length: f64, kerf: Kerf) -> Option<f64> {
        let cost = kerf.piece_cost(length, self.lengths.len());
        if cost <= self.remaining + LENGTH_EPSILON {
            Some((self.remaining - cost).max(0.0))
        } else {
            None
        }
    }

    pub fn fits(&self, length: f64, kerf: Kerf) -> bool {
        self.leftover_after(length, kerf).is_some()
    }

    pub fn place(&mut self, length: f64, kerf: Kerf) {
        let cost = kerf.piece_cost(length, self.lengths.len());
        self.remaining = (self.remaining - cost).max(0.0);
        self.lengths.push(length);
    }
}

/// Result of packing against a single stock length.
#[derive(Debug, Clone, Default)]
pub struct Packing {
    pub bins: Vec<BarBin>,
    /// Pieces that do not fit even on an empty bar.
    pub overflow: Vec<f64>,
}

impl Packing {
    pub fn bar_count(&self) -> usize {
        self.bins.len()
    }

    pub fn used_length(&self) -> f64 {
        self.bins.iter().map(|b| b.used_length()).sum()
    }

    pub fn stock_length(&self) -> f64 {
        self.bins.iter().map(|b| b.stock_length).sum()
    }

    /// Total used length over total stock length consumed.
    pub fn efficiency(&self) -> f64 {
        let stock = self.stock_length();
        if stock <= 0.0 {
            return 0.0;
        }
        self.used_length() / stock
    }
}

/// Returns the lengths sorted longest first; equal lengths keep their input order.
pub fn sorted_descending(lengths: &[f64]) -> Vec<f64> {
    let mut sorted = lengths.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// First-fit-decreasing packing of `lengths` onto bars of `stock_length`.
pub fn first_fit_decreasing(lengths: &[f64], stock_length: f64, kerf: Kerf) -> Packing {
    let mut packing = Packing::default();

    for length in sorted_descending(lengths) {
        if let Some(bin) = packing.bins.iter_mut().find(|b| b.fits(length, kerf)) {
            bin.place(length, kerf);
            continue;
        }

        let mut bin = BarBin::new(stock_length);
        if bin.fits(length, kerf) {
            bin.place(length, kerf);
            packing.bins.push(bin);
        } else {
            packing.overflow.push(length);
        }
    }

    tracing::debug!(
        stock_length,
        bars = packing.bins.len(),
        overflow = packing.overflow.len(),
        "first-fit-decreasing"
    );
    packing
}

/// Rounds a piece's length plus one gap up to the next multiple of `step`.
///
/// The result never falls short of `length + gap`.
pub fn upsized_stock_length(length: f64, kerf: Kerf, step: f64) -> f64 {
    let need = length + kerf.gap;
    let stock = (need / step).ceil() * step;
    if stock < need { stock + step } else { stock }
}
