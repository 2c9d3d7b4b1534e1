//! Small numeric helpers shared by metadata, histogramming and efficiency
//! computation. NaN marks a missing value everywhere in this crate.

use serde::{Deserialize, Serialize};

/// Per-column summary stored next to every encoded table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl ColumnSummary {
    pub const EMPTY: Self = Self {
        min: f64::NAN,
        max: f64::NAN,
        mean: f64::NAN,
        std: f64::NAN,
    };
}

/// min, max, mean and sample standard deviation (one delta degree of
/// freedom), ignoring NaN. A single finite value has an undefined std.
///
/// Single pass with Welford updates so that columns far from zero, such as
/// sensor ids stored as floats, keep their spread.
pub fn summarize(values: &[f64]) -> ColumnSummary {
    let mut count = 0usize;
    let mut mean = 0.0;
    let mut squares = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values.iter().copied().filter(|value| !value.is_nan()) {
        count += 1;
        let delta = value - mean;
        mean += delta / count as f64;
        squares += delta * (value - mean);
        min = min.min(value);
        max = max.max(value);
    }

    match count {
        0 => ColumnSummary::EMPTY,
        1 => ColumnSummary {
            min,
            max,
            mean,
            std: f64::NAN,
        },
        _ => ColumnSummary {
            min,
            max,
            mean,
            std: (squares / (count - 1) as f64).sqrt(),
        },
    }
}

/// Finite extent of the non-NaN values.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(None, |range, value| match range {
            None => Some((value, value)),
            Some((low, high)) => Some((low.min(value), high.max(value))),
        })
}

/// Bin counts over monotonically increasing `edges`. Bins are half-open
/// except the last one, which also takes values equal to the upper edge.
/// NaN and out-of-range values are not counted.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0u64; bins];
    if bins == 0 {
        return counts;
    }

    let low = edges[0];
    let high = edges[bins];
    for &value in values {
        if value.is_nan() || value < low || value > high {
            continue;
        }
        let bin = if value == high {
            bins - 1
        } else {
            // first edge strictly greater than the value closes its bin
            edges.partition_point(|edge| *edge <= value) - 1
        };
        counts[bin.min(bins - 1)] += 1;
    }
    counts
}
