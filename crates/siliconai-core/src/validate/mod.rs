//! Reference vs generated comparison datasets for the plotting layer.

pub mod efficiency;
pub mod hits;
pub mod histogram;
pub mod tracks;

pub use efficiency::{EfficiencyHistogram, EfficiencySeries, compare_efficiency};
pub use hits::{HitColumn, HitComparison, HitCounts, ScatterSeries, compare_hits};
pub use histogram::{Binning, HistogramSeries, PairedHistogram};
pub use tracks::{TrackSummary, compare_tracks};

use crate::codec::QuantizationScheme;
use crate::config::ValidatorConfig;
use crate::decode::{DecodedHit, MomentumCorrection, decode_table};
use crate::domain::{ValidatorError, ValidatorResult};
use crate::geometry::{CoordinateTransform, GeometryHandle};
use crate::store::{Artifact, GENERATED_TABLE, REFERENCE_TABLE, write_json_atomic};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const REFERENCE_DIRECTORY: &str = "reference";
pub const GENERATED_DIRECTORY: &str = "generated";
pub const PERFORMANCE_OUTPUT: &str = "validation_reco_performance.json";
pub const TRACKS_OUTPUT: &str = "validation_reco_tracks.json";
pub const LEGEND: [&str; 2] = ["Geant4", "Neural network"];
const PRIMARY_LABEL: &str = "primary particles only";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitValidation {
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<u32>,
    pub legend: [&'static str; 2],
    pub labels: Vec<String>,
    pub geometry_failures: usize,
    #[serde(flatten)]
    pub comparison: HitComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceValidation {
    pub legend: [&'static str; 2],
    pub labels: Vec<String>,
    pub series: Vec<EfficiencySeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackValidation {
    pub legend: [&'static str; 2],
    pub labels: Vec<String>,
    pub histograms: Vec<PairedHistogram>,
}

fn plot_labels(labels: &[String], events: Option<u64>) -> Vec<String> {
    let mut out = labels.to_vec();
    if let Some(events) = events {
        out.push(format!("{events} events"));
    }
    out.push(PRIMARY_LABEL.to_string());
    out
}

/// Hit-level validation of a model results artifact.
pub struct Validator {
    transform: CoordinateTransform,
    scheme: QuantizationScheme,
    output_path: PathBuf,
    labels: Vec<String>,
}

impl Validator {
    pub fn new(config: &ValidatorConfig, geometry: GeometryHandle) -> Self {
        Self {
            transform: CoordinateTransform::new(geometry),
            scheme: config.quantization,
            output_path: config.output_path.clone(),
            labels: config.labels.clone(),
        }
    }

    pub fn output_file(&self, input: &Path, event: Option<u32>) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results".to_string());
        let name = match event {
            Some(event) => format!("validation_{stem}_{event}.json"),
            None => format!("validation_{stem}.json"),
        };
        self.output_path.join(name)
    }

    fn decoded(
        &self,
        artifact: &Artifact,
        table: &str,
    ) -> ValidatorResult<(Vec<DecodedHit>, usize)> {
        let encoded = artifact.hits_table(table)?;
        let decoded = decode_table(
            &encoded,
            artifact.header.sentinels,
            &self.transform,
            MomentumCorrection::AsStored,
        );
        if decoded.geometry_failures > 0 {
            warn!(
                table,
                failures = decoded.geometry_failures,
                "rows on unknown surfaces carry NaN positions"
            );
        }
        Ok((decoded.hits, decoded.geometry_failures))
    }

    /// Compare both tables of `artifact`, restricted to one event when
    /// `event` is given.
    pub fn compare_artifact(
        &self,
        artifact: &Artifact,
        event: Option<u32>,
    ) -> ValidatorResult<HitValidation> {
        artifact.expect_scheme(self.scheme)?;
        let (mut reference, reference_failures) = self.decoded(artifact, REFERENCE_TABLE)?;
        let (mut generated, generated_failures) = self.decoded(artifact, GENERATED_TABLE)?;
        // labels report the size of the whole reference sample
        let reference_events = reference
            .iter()
            .map(|hit| hit.event_id)
            .collect::<BTreeSet<_>>()
            .len();

        if let Some(event) = event {
            reference.retain(|hit| hit.event_id == event);
            generated.retain(|hit| hit.event_id == event);
            if reference.is_empty() {
                return Err(ValidatorError::index_structure(
                    "INDEX.MISSING_EVENT",
                    format!(
                        "event {} is not present in '{}' of '{}'",
                        event,
                        REFERENCE_TABLE,
                        artifact.source().display()
                    ),
                ));
            }
        }

        let comparison = compare_hits(&reference, &generated, event.is_some());
        Ok(HitValidation {
            source: artifact.source().to_path_buf(),
            event,
            legend: LEGEND,
            labels: plot_labels(&self.labels, Some(reference_events as u64)),
            geometry_failures: reference_failures + generated_failures,
            comparison,
        })
    }

    pub fn validate_file(
        &self,
        input: impl AsRef<Path>,
        event: Option<u32>,
    ) -> ValidatorResult<(PathBuf, HitValidation)> {
        let input = input.as_ref();
        info!(input = %input.display(), ?event, "validating hits");
        let artifact = Artifact::read(input)?;
        let validation = self.compare_artifact(&artifact, event)?;

        let output = self.output_file(input, event);
        write_json_atomic(&output, &validation, "IO.VALIDATION_WRITE")?;
        info!(output = %output.display(), events = validation.comparison.events, "validation written");
        Ok((output, validation))
    }
}

/// Reconstruction-level validation of the `reference/` and `generated/`
/// outputs below the configured output path.
pub struct RecoValidator {
    output_path: PathBuf,
    labels: Vec<String>,
}

impl RecoValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            output_path: config.output_path.clone(),
            labels: plot_labels(&config.labels, config.events),
        }
    }

    fn side_file(&self, directory: &str, file: &str) -> PathBuf {
        self.output_path.join(directory).join(file)
    }

    pub fn performance(&self) -> ValidatorResult<PerformanceValidation> {
        let mut series = Vec::new();
        let stages = [
            ("Seeding", efficiency::SEEDING_FILE),
            ("CKF", efficiency::CKF_FILE),
        ];
        for (stage, file) in stages {
            info!(stage, "comparing reconstruction efficiency");
            series.extend(efficiency::compare_stage(
                stage,
                &self.side_file(REFERENCE_DIRECTORY, file),
                &self.side_file(GENERATED_DIRECTORY, file),
            )?);
        }
        Ok(PerformanceValidation {
            legend: LEGEND,
            labels: self.labels.clone(),
            series,
        })
    }

    pub fn tracks(&self) -> ValidatorResult<TrackValidation> {
        info!("comparing fitted track parameters");
        let summary =
            |side: &str| TrackSummary::from_path(self.side_file(side, tracks::TRACK_SUMMARY_FILE));
        let reference = summary(REFERENCE_DIRECTORY)?;
        let generated = summary(GENERATED_DIRECTORY)?;
        Ok(TrackValidation {
            legend: LEGEND,
            labels: self.labels.clone(),
            histograms: compare_tracks(&reference, &generated)?,
        })
    }

    pub fn write_performance(&self) -> ValidatorResult<PathBuf> {
        let output = self.output_path.join(PERFORMANCE_OUTPUT);
        write_json_atomic(&output, &self.performance()?, "IO.VALIDATION_WRITE")?;
        Ok(output)
    }

    pub fn write_tracks(&self) -> ValidatorResult<PathBuf> {
        let output = self.output_path.join(TRACKS_OUTPUT);
        write_json_atomic(&output, &self.tracks()?, "IO.VALIDATION_WRITE")?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::{RecoValidator, Validator, plot_labels};
    use crate::codec::RecordCodec;
    use crate::config::ValidatorConfig;
    use crate::domain::ErrorCategory;
    use crate::geometry::{PlanarSurfaceGeometry, SurfacePlacement};
    use crate::store::{Artifact, ArtifactHeader, GENERATED_TABLE, REFERENCE_TABLE};
    use crate::table::{EncodedRow, EncodedTable};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn row(event_id: u32, index: i32, geometry_id: u64) -> EncodedRow {
        EncodedRow {
            event_id,
            index,
            geometry_id,
            particle_type: Some(13),
            lxq: 0.5,
            lyq: 0.25,
            tpxq: 3.0,
            tpyq: 4.0,
            tpzq: 1.0,
            residual: None,
        }
    }

    fn event_rows(event_id: u32, hits: i32) -> Vec<EncodedRow> {
        let mut rows = vec![row(event_id, 0, 1_000_000)];
        rows.extend((1..=hits).map(|index| row(event_id, index, 9)));
        rows.push(row(event_id, hits + 1, 1_000_001));
        rows
    }

    fn validator(output: &std::path::Path) -> Validator {
        let mut geometry = PlanarSurfaceGeometry::default();
        geometry
            .insert(
                9,
                SurfacePlacement::new(
                    [0.0, 0.0, 20.0],
                    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                ),
            )
            .expect("surface 9");
        let config = ValidatorConfig {
            output_path: output.to_path_buf(),
            labels: vec!["ODD".to_string()],
            ..ValidatorConfig::default()
        };
        Validator::new(&config, Arc::new(geometry))
    }

    fn artifact() -> Artifact {
        let mut artifact = Artifact::new(ArtifactHeader::for_codec(&RecordCodec::default()));
        let reference = EncodedTable::new([event_rows(0, 2), event_rows(1, 3)].concat());
        let generated = EncodedTable::new([event_rows(0, 2), event_rows(2, 1)].concat());
        artifact
            .insert_hits(REFERENCE_TABLE, &reference)
            .expect("reference table");
        artifact
            .insert_hits(GENERATED_TABLE, &generated)
            .expect("generated table");
        artifact
    }

    #[test]
    fn sentinels_are_excluded_from_hit_counts() {
        let temp = TempDir::new().expect("tempdir should be created");
        let validation = validator(temp.path())
            .compare_artifact(&artifact(), None)
            .expect("tables compare");

        let counts = &validation.comparison.counts;
        assert_eq!(counts.reference.values().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(counts.difference.values().copied().collect::<Vec<_>>(), vec![0, 3, 1]);
        assert_eq!(validation.labels, vec!["ODD", "2 events", "primary particles only"]);
        assert_eq!(validation.geometry_failures, 0);
    }

    #[test]
    fn single_event_output_is_named_after_the_event() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input = temp.path().join("results.json");
        artifact().write_atomic(&input).expect("write results");

        let validator = validator(temp.path());
        let (output, validation) = validator
            .validate_file(&input, Some(1))
            .expect("event 1 validates");
        assert_eq!(output, temp.path().join("validation_results_1.json"));
        assert!(output.is_file());
        assert_eq!(validation.comparison.scatter.len(), 2);
        assert!(validation.comparison.scatter[1].generated.is_empty());
        assert_eq!(validation.comparison.events, 1);
        assert_eq!(validation.labels, vec!["ODD", "2 events", "primary particles only"]);

        let missing = validator
            .validate_file(&input, Some(7))
            .expect_err("event 7 does not exist");
        assert_eq!(missing.category(), ErrorCategory::IndexStructure);
    }

    #[test]
    fn reco_performance_reads_both_sides() {
        let temp = TempDir::new().expect("tempdir should be created");
        let efficiency = r#"{
            "trackeff_vs_pT": {"passed": [0, 5, 8], "total": [0, 10, 10], "edges": [0, 1, 2, 3]},
            "trackeff_vs_z0": {"passed": [1], "total": [2], "edges": [-10, 10]}
        }"#;
        for side in ["reference", "generated"] {
            let directory = temp.path().join(side);
            fs::create_dir_all(&directory).expect("side dir");
            for file in ["performance_seeding.json", "performance_fitting_ckf.json"] {
                fs::write(directory.join(file), efficiency).expect("write efficiency");
            }
        }

        let config = ValidatorConfig {
            output_path: temp.path().to_path_buf(),
            events: Some(100),
            ..ValidatorConfig::default()
        };
        let reco = RecoValidator::new(&config);
        let performance = reco.performance().expect("performance compares");
        assert_eq!(performance.series.len(), 4);
        assert_eq!(performance.series[0].stage, "Seeding");
        assert_eq!(performance.series[0].edges, vec![1.0, 2.0, 3.0]);
        assert_eq!(performance.series[2].stage, "CKF");
        assert_eq!(performance.labels, vec!["100 events", "primary particles only"]);

        let tracks = reco.write_tracks().expect_err("no track summaries");
        assert_eq!(tracks.category(), ErrorCategory::IoSystem);
        assert_eq!(plot_labels(&[], None), vec!["primary particles only"]);
    }
}
