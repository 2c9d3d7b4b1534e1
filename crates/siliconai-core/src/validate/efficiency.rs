use crate::domain::{ValidatorError, ValidatorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const SEEDING_FILE: &str = "performance_seeding.json";
pub const CKF_FILE: &str = "performance_fitting_ckf.json";
pub const EFFICIENCY_VARIABLES: [(&str, &str); 2] = [
    ("trackeff_vs_pT", "Track momentum [GeV]"),
    ("trackeff_vs_z0", "Track z_0 [mm]"),
];

/// Passed and total histograms of one efficiency over shared bin edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyHistogram {
    pub passed: Vec<f64>,
    pub total: Vec<f64>,
    pub edges: Vec<f64>,
}

impl EfficiencyHistogram {
    fn check_shape(&self, origin: &str) -> ValidatorResult<()> {
        if self.passed.len() != self.total.len() || self.edges.len() != self.total.len() + 1 {
            return Err(ValidatorError::schema(
                "SCHEMA.EFFICIENCY_SHAPE",
                format!(
                    "{}: {} passed bins, {} total bins and {} edges",
                    origin,
                    self.passed.len(),
                    self.total.len(),
                    self.edges.len()
                ),
            ));
        }
        Ok(())
    }
}

pub fn read_efficiency_file(
    path: impl AsRef<Path>,
) -> ValidatorResult<BTreeMap<String, EfficiencyHistogram>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| {
        ValidatorError::io_system(
            "IO.PERFORMANCE_READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })?;
    serde_json::from_str(&content).map_err(|source| {
        ValidatorError::schema(
            "SCHEMA.PERFORMANCE_PARSE",
            format!("failed to parse '{}': {}", path.display(), source),
        )
    })
}

/// Efficiency and its error per kept bin of one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyValues {
    pub efficiency: Vec<f64>,
    pub error: Vec<f64>,
}

impl EfficiencyValues {
    fn select(histogram: &EfficiencyHistogram, kept: &[usize]) -> Self {
        let (efficiency, error) = kept
            .iter()
            .map(|&bin| efficiency_with_error(histogram.passed[bin], histogram.total[bin]))
            .unzip();
        Self { efficiency, error }
    }
}

/// `passed / total` with error `sqrt(passed) / total * efficiency`; NaN for
/// an empty total.
pub fn efficiency_with_error(passed: f64, total: f64) -> (f64, f64) {
    if total == 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let efficiency = passed / total;
    (efficiency, passed.sqrt() / total * efficiency)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencySeries {
    pub stage: String,
    pub variable: String,
    pub label_x: String,
    /// Edges of the kept bins followed by the edge closing the last one.
    pub edges: Vec<f64>,
    pub bin_centers: Vec<f64>,
    pub bin_half_widths: Vec<f64>,
    pub reference: EfficiencyValues,
    pub generated: EfficiencyValues,
}

impl EfficiencySeries {
    pub fn len(&self) -> usize {
        self.bin_centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bin_centers.is_empty()
    }
}

/// Compare two efficiencies on the bins where the reference total is
/// non-zero. An all-empty reference yields an empty series.
pub fn compare_efficiency(
    stage: &str,
    variable: &str,
    label_x: &str,
    reference: &EfficiencyHistogram,
    generated: &EfficiencyHistogram,
) -> ValidatorResult<EfficiencySeries> {
    reference.check_shape(&format!("{stage} reference '{variable}'"))?;
    generated.check_shape(&format!("{stage} generated '{variable}'"))?;
    if reference.total.len() != generated.total.len() {
        return Err(ValidatorError::schema(
            "SCHEMA.EFFICIENCY_SHAPE",
            format!(
                "{} '{}': reference has {} bins, generated has {}",
                stage,
                variable,
                reference.total.len(),
                generated.total.len()
            ),
        ));
    }

    let kept: Vec<usize> = reference
        .total
        .iter()
        .enumerate()
        .filter(|(_, total)| **total > 0.0)
        .map(|(bin, _)| bin)
        .collect();

    let mut edges: Vec<f64> = kept.iter().map(|&bin| reference.edges[bin]).collect();
    if let Some(&last) = kept.last() {
        edges.push(reference.edges[last + 1]);
    }
    let (bin_centers, bin_half_widths) = kept
        .iter()
        .map(|&bin| {
            let (low, high) = (reference.edges[bin], reference.edges[bin + 1]);
            ((low + high) / 2.0, (high - low) / 2.0)
        })
        .unzip();

    Ok(EfficiencySeries {
        stage: stage.to_string(),
        variable: variable.to_string(),
        label_x: label_x.to_string(),
        edges,
        bin_centers,
        bin_half_widths,
        reference: EfficiencyValues::select(reference, &kept),
        generated: EfficiencyValues::select(generated, &kept),
    })
}

/// Every efficiency variable of one reconstruction stage.
pub fn compare_stage(
    stage: &str,
    reference_path: &Path,
    generated_path: &Path,
) -> ValidatorResult<Vec<EfficiencySeries>> {
    let reference = read_efficiency_file(reference_path)?;
    let generated = read_efficiency_file(generated_path)?;
    let lookup = |histograms: &BTreeMap<String, EfficiencyHistogram>,
                  path: &Path,
                  variable: &str| {
        histograms.get(variable).cloned().ok_or_else(|| {
            ValidatorError::schema(
                "SCHEMA.MISSING_TABLE",
                format!("'{}' has no efficiency '{}'", path.display(), variable),
            )
        })
    };

    EFFICIENCY_VARIABLES
        .iter()
        .map(|(variable, label_x)| {
            let reference = lookup(&reference, reference_path, variable)?;
            let generated = lookup(&generated, generated_path, variable)?;
            compare_efficiency(stage, variable, label_x, &reference, &generated)
        })
        .collect()
}
