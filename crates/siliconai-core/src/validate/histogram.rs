use crate::numerics::{finite_range, histogram};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BINS: usize = 25;

/// Fixed `(bins, start, end)` binning of a plotted variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    pub bins: usize,
    pub start: f64,
    pub end: f64,
}

impl Binning {
    pub const fn new(bins: usize, start: f64, end: f64) -> Self {
        Self { bins, start, end }
    }

    /// Plotting defaults of the hit and track variables.
    pub fn for_variable(variable: &str) -> Option<Self> {
        let binning = match variable {
            "nhits" => Self::new(40, 0.0, 40.0),
            "nhits_diff" => Self::new(7, 0.0, 7.0),
            "tr" => Self::new(120, 0.0, 1200.0),
            "tx" | "ty" => Self::new(440, -1100.0, 1100.0),
            "tz" => Self::new(120, -600.0, 600.0),
            "lx" | "ly" => Self::new(110, -55.0, 55.0),
            "tpt" => Self::new(150, 0.0, 150.0),
            "tpx" | "tpy" | "tpz" => Self::new(200, -100.0, 100.0),
            "eLOC0_fit" | "res_eLOC0_fit" => Self::new(40, -0.2, 0.2),
            "pull_eLOC0_fit" => Self::new(40, -10.0, 10.0),
            "eQOP_fit" | "res_eQOP_fit" => Self::new(80, -4.0e-2, 4.0e-2),
            "res_ePHI_fit" => Self::new(80, -4.0e-3, 4.0e-3),
            "pull_ePHI_fit" | "pull_eQOP_fit" => Self::new(80, -20.0, 20.0),
            _ => return None,
        };
        Some(binning)
    }

    /// Default bins over the extent of `values`. A degenerate extent is
    /// widened by half a unit each way.
    pub fn from_extent(values: &[f64]) -> Self {
        match finite_range(values) {
            Some((low, high)) if low < high => Self::new(DEFAULT_BINS, low, high),
            Some((value, _)) => Self::new(DEFAULT_BINS, value - 0.5, value + 0.5),
            None => Self::new(DEFAULT_BINS, 0.0, 1.0),
        }
    }

    pub fn resolve(variable: &str, reference: &[f64]) -> Self {
        Self::for_variable(variable).unwrap_or_else(|| Self::from_extent(reference))
    }

    /// `bins + 1` evenly spaced edges; the last one is `end` exactly.
    pub fn edges(&self) -> Vec<f64> {
        let bins = self.bins.max(1);
        let width = (self.end - self.start) / bins as f64;
        (0..=bins)
            .map(|edge| {
                if edge == bins {
                    self.end
                } else {
                    self.start + width * edge as f64
                }
            })
            .collect()
    }
}

/// Variables drawn with a logarithmic count axis.
pub fn log_scale(variable: &str) -> bool {
    matches!(
        variable,
        "nhits"
            | "nhits_diff"
            | "eLOC0_fit"
            | "eQOP_fit"
            | "res_eLOC0_fit"
            | "pull_eLOC0_fit"
            | "res_eLOC1_fit"
            | "pull_eLOC1_fit"
            | "res_eQOP_fit"
            | "pull_eQOP_fit"
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSeries {
    pub entries: usize,
    pub counts: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<f64>>,
}

impl HistogramSeries {
    pub fn fill(values: &[f64], edges: &[f64], errors: bool) -> Self {
        let counts = histogram(values, edges);
        let errors = errors.then(|| counts.iter().map(|count| (*count as f64).sqrt()).collect());
        Self {
            entries: values.len(),
            counts,
            errors,
        }
    }
}

/// One reference histogram and, optionally, the generated one on the same
/// edges with their bin ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedHistogram {
    pub variable: String,
    pub edges: Vec<f64>,
    pub log_y: bool,
    pub reference: HistogramSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<HistogramSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<Vec<f64>>,
}

impl PairedHistogram {
    pub fn single(variable: &str, values: &[f64], errors: bool) -> Self {
        let edges = Binning::resolve(variable, values).edges();
        Self {
            variable: variable.to_string(),
            log_y: log_scale(variable),
            reference: HistogramSeries::fill(values, &edges, errors),
            generated: None,
            ratio: None,
            edges,
        }
    }

    pub fn paired(
        variable: &str,
        reference: &[f64],
        generated: &[f64],
        errors: bool,
        with_ratio: bool,
    ) -> Self {
        let mut histogram = Self::single(variable, reference, errors);
        let generated = HistogramSeries::fill(generated, &histogram.edges, errors);
        if with_ratio {
            histogram.ratio = Some(bin_ratio(&histogram.reference.counts, &generated.counts));
        }
        histogram.generated = Some(generated);
        histogram
    }
}

/// `generated / reference` per bin, 1 where the reference bin is empty.
pub fn bin_ratio(reference: &[u64], generated: &[u64]) -> Vec<f64> {
    reference
        .iter()
        .zip(generated)
        .map(|(reference, generated)| {
            if *reference == 0 {
                1.0
            } else {
                *generated as f64 / *reference as f64
            }
        })
        .collect()
}
