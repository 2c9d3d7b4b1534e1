use super::histogram::PairedHistogram;
use crate::domain::{ValidatorError, ValidatorResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const TRACK_SUMMARY_FILE: &str = "tracksummary_ckf.json";
pub const TRACK_SUMMARY_TREE: &str = "tracksummary";

pub const TRACK_VARIABLES: [&str; 15] = [
    "eLOC0_fit",
    "eLOC1_fit",
    "ePHI_fit",
    "eTHETA_fit",
    "eQOP_fit",
    "res_eLOC0_fit",
    "pull_eLOC0_fit",
    "res_eLOC1_fit",
    "pull_eLOC1_fit",
    "res_ePHI_fit",
    "pull_ePHI_fit",
    "res_eTHETA_fit",
    "pull_eTHETA_fit",
    "res_eQOP_fit",
    "pull_eQOP_fit",
];

/// Residuals and pulls are compared by shape only.
pub fn has_ratio(variable: &str) -> bool {
    !variable.starts_with("res_") && !variable.starts_with("pull_")
}

/// Per-event lists of fitted track parameters, keyed by variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackSummary {
    variables: BTreeMap<String, Vec<Vec<Option<f64>>>>,
}

impl TrackSummary {
    pub fn from_path(path: impl AsRef<Path>) -> ValidatorResult<Self> {
        #[derive(Deserialize)]
        struct File {
            tracksummary: BTreeMap<String, Vec<Vec<Option<f64>>>>,
        }

        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            ValidatorError::io_system(
                "IO.TRACKS_READ",
                format!("failed to read '{}': {}", path.display(), source),
            )
        })?;
        let file: File = serde_json::from_str(&content).map_err(|source| {
            ValidatorError::schema(
                "SCHEMA.TRACKS_PARSE",
                format!(
                    "'{}' tree '{}': {}",
                    path.display(),
                    TRACK_SUMMARY_TREE,
                    source
                ),
            )
        })?;
        Ok(Self {
            variables: file.tracksummary,
        })
    }

    /// All tracks of all events; missing values become NaN.
    pub fn flatten(&self, variable: &str) -> Option<Vec<f64>> {
        self.variables.get(variable).map(|events| {
            events
                .iter()
                .flatten()
                .map(|value| value.unwrap_or(f64::NAN))
                .collect()
        })
    }
}

pub fn compare_tracks(
    reference: &TrackSummary,
    generated: &TrackSummary,
) -> ValidatorResult<Vec<PairedHistogram>> {
    TRACK_VARIABLES
        .iter()
        .map(|variable| {
            let flatten = |summary: &TrackSummary, side: &str| {
                summary.flatten(variable).ok_or_else(|| {
                    ValidatorError::schema(
                        "SCHEMA.MISSING_COLUMN",
                        format!("{} track summary is missing '{}'", side, variable),
                    )
                })
            };
            let reference = flatten(reference, "reference")?;
            let generated = flatten(generated, "generated")?;
            Ok(PairedHistogram::paired(
                variable,
                &reference,
                &generated,
                true,
                has_ratio(variable),
            ))
        })
        .collect()
}
