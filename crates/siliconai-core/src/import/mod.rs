//! Model results → engine-schema hit files.

use crate::codec::QuantizationScheme;
use crate::config::ValidatorConfig;
use crate::decode::{DecodedHit, MomentumCorrection, decode_table};
use crate::domain::{ValidatorError, ValidatorResult};
use crate::geometry::{CoordinateTransform, GeometryHandle};
use crate::simulation::HITS_TREE;
use crate::store::{Artifact, GENERATED_TABLE, REFERENCE_TABLE, write_json_atomic};
use crate::table::columns::nan_as_null_f32;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One hit in the simulation engine's own output schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineHitRecord {
    pub event_id: u32,
    pub geometry_id: u64,
    pub barcode: u64,
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
    pub tt: f32,
    pub tpx: f32,
    pub tpy: f32,
    pub tpz: f32,
    pub te: f32,
    pub deltapx: f32,
    pub deltapy: f32,
    pub deltapz: f32,
    pub deltae: f32,
    pub index: i32,
}

impl EngineHitRecord {
    pub fn from_decoded(hit: &DecodedHit, barcode: u64) -> Self {
        Self {
            event_id: hit.event_id,
            geometry_id: hit.geometry_id,
            barcode,
            tx: hit.tx as f32,
            ty: hit.ty as f32,
            tz: hit.tz as f32,
            tt: 0.0,
            tpx: hit.tpx as f32,
            tpy: hit.tpy as f32,
            tpz: hit.tpz as f32,
            te: hit.te as f32,
            deltapx: hit.deltapx as f32,
            deltapy: hit.deltapy as f32,
            deltapz: hit.deltapz as f32,
            deltae: hit.deltae as f32,
            index: hit.index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineHitColumns {
    pub event_id: Vec<u32>,
    pub geometry_id: Vec<u64>,
    pub barcode: Vec<u64>,
    #[serde(with = "nan_as_null_f32")]
    pub tx: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub ty: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub tz: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub tt: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub tpx: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub tpy: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub tpz: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub te: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub deltapx: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub deltapy: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub deltapz: Vec<f32>,
    #[serde(with = "nan_as_null_f32")]
    pub deltae: Vec<f32>,
    pub index: Vec<i32>,
}

impl EngineHitColumns {
    pub fn from_records(records: &[EngineHitRecord]) -> Self {
        let mut columns = Self::default();
        for record in records {
            columns.event_id.push(record.event_id);
            columns.geometry_id.push(record.geometry_id);
            columns.barcode.push(record.barcode);
            columns.tx.push(record.tx);
            columns.ty.push(record.ty);
            columns.tz.push(record.tz);
            columns.tt.push(record.tt);
            columns.tpx.push(record.tpx);
            columns.tpy.push(record.tpy);
            columns.tpz.push(record.tpz);
            columns.te.push(record.te);
            columns.deltapx.push(record.deltapx);
            columns.deltapy.push(record.deltapy);
            columns.deltapz.push(record.deltapz);
            columns.deltae.push(record.deltae);
            columns.index.push(record.index);
        }
        columns
    }

    pub fn len(&self) -> usize {
        self.event_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_id.is_empty()
    }
}

#[derive(Serialize)]
struct EngineHitFile<'a> {
    hits: &'a EngineHitColumns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Reference,
    Generated,
}

impl Side {
    pub const ALL: [Side; 2] = [Self::Reference, Self::Generated];

    pub const fn table(self) -> &'static str {
        match self {
            Self::Reference => REFERENCE_TABLE,
            Self::Generated => GENERATED_TABLE,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideSummary {
    pub table: &'static str,
    pub output: PathBuf,
    pub rows: usize,
    pub dropped_sentinels: usize,
    pub geometry_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub input: PathBuf,
    pub sides: Vec<SideSummary>,
}

pub struct Importer {
    transform: CoordinateTransform,
    scheme: QuantizationScheme,
    barcode: u64,
    output_path: PathBuf,
}

impl Importer {
    pub fn new(config: &ValidatorConfig, geometry: GeometryHandle) -> Self {
        Self {
            transform: CoordinateTransform::new(geometry),
            scheme: config.quantization,
            barcode: config.primary_barcode,
            output_path: config.output_path.clone(),
        }
    }

    pub fn output_file(&self, side: Side) -> PathBuf {
        self.output_path.join(format!("hits_{}.json", side.suffix()))
    }

    /// Decode one side of a results artifact into engine hit records.
    pub fn preprocess(
        &self,
        artifact: &Artifact,
        side: Side,
    ) -> ValidatorResult<(Vec<EngineHitRecord>, usize, usize)> {
        let table = artifact.hits_table(side.table())?;
        let decoded = decode_table(
            &table,
            artifact.header.sentinels,
            &self.transform,
            MomentumCorrection::SubtractResidual,
        );
        if decoded.geometry_failures > 0 {
            warn!(
                table = side.table(),
                failures = decoded.geometry_failures,
                "rows on unknown surfaces carry NaN positions"
            );
        }
        let records = decoded
            .hits
            .iter()
            .map(|hit| EngineHitRecord::from_decoded(hit, self.barcode))
            .collect();
        Ok((records, decoded.dropped_sentinels, decoded.geometry_failures))
    }

    pub fn import_file(&self, input: impl AsRef<Path>) -> ValidatorResult<ImportSummary> {
        let input = input.as_ref();
        info!(input = %input.display(), "importing data");
        let artifact = Artifact::read(input)?;
        artifact.expect_scheme(self.scheme)?;

        let mut prepared = Vec::with_capacity(Side::ALL.len());
        for side in Side::ALL {
            prepared.push((side, self.preprocess(&artifact, side)?));
        }

        let mut sides = Vec::with_capacity(prepared.len());
        for (side, (records, dropped_sentinels, geometry_failures)) in prepared {
            let output = self.output_file(side);
            let columns = EngineHitColumns::from_records(&records);
            info!(side = side.suffix(), output = %output.display(), rows = columns.len(), "writing hits");
            write_json_atomic(&output, &EngineHitFile { hits: &columns }, "IO.HITS_WRITE")?;
            sides.push(SideSummary {
                table: side.table(),
                output,
                rows: columns.len(),
                dropped_sentinels,
                geometry_failures,
            });
        }

        Ok(ImportSummary {
            input: input.to_path_buf(),
            sides,
        })
    }
}

/// Read back a file written by [`Importer::import_file`].
pub fn read_hits_file(path: impl AsRef<Path>) -> ValidatorResult<EngineHitColumns> {
    #[derive(Deserialize)]
    struct File {
        hits: EngineHitColumns,
    }

    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| {
        ValidatorError::io_system(
            "IO.HITS_READ",
            format!("failed to read hits '{}': {}", path.display(), source),
        )
    })?;
    let file: File = serde_json::from_str(&content).map_err(|source| {
        ValidatorError::schema(
            "SCHEMA.HITS_PARSE",
            format!("'{}' tree '{}': {}", path.display(), HITS_TREE, source),
        )
    })?;
    Ok(file.hits)
}
