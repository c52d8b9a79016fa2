#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sum of weights and sum of squared weights
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct Bin {
    pub sumw: f64,
    pub sumw2: f64,
}

impl Bin {
    fn fill(&mut self, weight: f64) {
        self.sumw += weight;
        self.sumw2 += weight * weight;
    }
}

/// One-dimensional histogram with equal-width bins
///
/// Values below the lower edge end up in the underflow bin, values at or
/// above the upper edge (and NaN) in the overflow bin.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Debug)]
pub struct Histo1D {
    name: String,
    title: String,
    xmin: f64,
    xmax: f64,
    bins: Vec<Bin>,
    underflow: Bin,
    overflow: Bin,
    entries: f64,
}

impl Histo1D {
    /// Create an empty histogram with `nbins` bins in `[xmin, xmax)`
    ///
    /// # Panics
    ///
    /// Panics if `nbins` is zero or the range is empty.
    pub fn new(name: impl Into<String>, nbins: usize, xmin: f64, xmax: f64) -> Self {
        assert!(nbins > 0, "histogram needs at least one bin");
        assert!(xmin < xmax, "empty histogram range [{xmin}, {xmax})");
        Self {
            name: name.into(),
            title: String::new(),
            xmin,
            xmax,
            bins: vec![Bin::default(); nbins],
            underflow: Bin::default(),
            overflow: Bin::default(),
            entries: 0.,
        }
    }

    /// Set the histogram title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn nbins(&self) -> usize {
        self.bins.len()
    }

    /// In-range bins
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn underflow(&self) -> &Bin {
        &self.underflow
    }

    pub fn overflow(&self) -> &Bin {
        &self.overflow
    }

    /// Number of fills, unless overwritten with `set_entries`
    pub fn entries(&self) -> f64 {
        self.entries
    }

    /// Overwrite the entry count
    pub fn set_entries(&mut self, entries: f64) {
        self.entries = entries;
    }

    /// Lower and upper edge of the in-range bin `idx`
    pub fn bin_edges(&self, idx: usize) -> (f64, f64) {
        let width = (self.xmax - self.xmin) / self.nbins() as f64;
        let low = self.xmin + idx as f64 * width;
        let high = if idx + 1 == self.nbins() {
            self.xmax
        } else {
            self.xmin + (idx + 1) as f64 * width
        };
        (low, high)
    }

    /// Index of the in-range bin containing `x`, `None` for out-of-range values
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.xmin && x < self.xmax) {
            return None;
        }
        let rel = (x - self.xmin) / (self.xmax - self.xmin);
        let idx = (rel * self.nbins() as f64) as usize;
        // guard against rounding just below the upper edge
        Some(idx.min(self.nbins() - 1))
    }

    /// Add `weight` to the bin containing `x`
    pub fn fill(&mut self, x: f64, weight: f64) {
        let bin = if x < self.xmin {
            &mut self.underflow
        } else {
            match self.find_bin(x) {
                Some(idx) => &mut self.bins[idx],
                None => &mut self.overflow,
            }
        };
        bin.fill(weight);
        self.entries += 1.;
    }

    /// Sum of weights in the bin containing `x`, including flow bins
    pub fn sumw_at(&self, x: f64) -> f64 {
        if x < self.xmin {
            self.underflow.sumw
        } else {
            match self.find_bin(x) {
                Some(idx) => self.bins[idx].sumw,
                None => self.overflow.sumw,
            }
        }
    }

    fn all_bins(&self) -> impl Iterator<Item = &Bin> {
        self.bins.iter().chain([&self.underflow, &self.overflow])
    }

    /// Sum of weights over all bins including underflow and overflow
    pub fn sumw(&self) -> f64 {
        self.all_bins().map(|b| b.sumw).sum()
    }

    /// Sum of squared weights over all bins including underflow and overflow
    pub fn sumw2(&self) -> f64 {
        self.all_bins().map(|b| b.sumw2).sum()
    }

    /// Build a histogram from stored bin contents
    pub(crate) fn from_parts(
        name: String,
        title: String,
        edges: (f64, f64),
        bins: Vec<Bin>,
        flows: (Bin, Bin),
        entries: f64,
    ) -> Self {
        let (xmin, xmax) = edges;
        let (underflow, overflow) = flows;
        Self {
            name,
            title,
            xmin,
            xmax,
            bins,
            underflow,
            overflow,
            entries,
        }
    }
}
