//! Single-file artifact holding named columnar tables behind a header.

use crate::codec::{QuantizationScheme, RecordCodec};
use crate::domain::{Sentinels, ValidatorError, ValidatorResult};
use crate::table::columns::{HIT_KEY_COLUMNS, HIT_REQUIRED_COLUMNS, HIT_RESIDUAL_COLUMNS};
use crate::table::{EncodedTable, HitColumns, Metadata, MetadataColumns};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;
pub const HITS_TABLE: &str = "hits";
pub const METADATA_TABLE: &str = "metadata";
pub const REFERENCE_TABLE: &str = "reference_data";
pub const GENERATED_TABLE: &str = "generated_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub quantization: QuantizationScheme,
    pub sentinels: Sentinels,
    pub end_vertex_quirk: bool,
}

impl ArtifactHeader {
    pub fn for_codec(codec: &RecordCodec) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            quantization: codec.scheme(),
            sentinels: codec.sentinels(),
            end_vertex_quirk: codec.end_vertex_mode().is_quirk(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub header: ArtifactHeader,
    tables: BTreeMap<String, Value>,
    #[serde(skip)]
    source: PathBuf,
}

impl Artifact {
    pub fn new(header: ArtifactHeader) -> Self {
        Self {
            header,
            tables: BTreeMap::new(),
            source: PathBuf::from("<memory>"),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn insert_hits(&mut self, name: &str, table: &EncodedTable) -> ValidatorResult<()> {
        self.insert_value(name, serde_json::to_value(table.to_columns()))
    }

    pub fn insert_metadata(&mut self, metadata: &Metadata) -> ValidatorResult<()> {
        self.insert_value(METADATA_TABLE, serde_json::to_value(metadata.to_columns()))
    }

    fn insert_value(
        &mut self,
        name: &str,
        value: Result<Value, serde_json::Error>,
    ) -> ValidatorResult<()> {
        let value = value.map_err(|source| {
            ValidatorError::internal(
                "INTERNAL.TABLE_ENCODE",
                format!("failed to encode table '{}': {}", name, source),
            )
        })?;
        self.tables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn write_atomic(&self, path: impl AsRef<Path>) -> ValidatorResult<()> {
        let path = path.as_ref();
        write_json_atomic(path, self, "IO.ARTIFACT_WRITE")?;
        debug!(path = %path.display(), tables = self.tables.len(), "artifact written");
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> ValidatorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            ValidatorError::io_system(
                "IO.ARTIFACT_READ",
                format!("failed to read artifact '{}': {}", path.display(), source),
            )
        })?;
        let mut artifact: Self = serde_json::from_str(&content).map_err(|source| {
            ValidatorError::schema(
                "SCHEMA.ARTIFACT_PARSE",
                format!("failed to parse artifact '{}': {}", path.display(), source),
            )
        })?;
        artifact.source = path.to_path_buf();

        if artifact.header.format_version != FORMAT_VERSION {
            return Err(ValidatorError::schema(
                "SCHEMA.FORMAT_VERSION",
                format!(
                    "artifact '{}' has format version {}, expected {}",
                    path.display(),
                    artifact.header.format_version,
                    FORMAT_VERSION
                ),
            ));
        }
        artifact.header.sentinels.validate()?;
        Ok(artifact)
    }

    /// Reject artifacts quantized with a different scheme than `expected`.
    pub fn expect_scheme(&self, expected: QuantizationScheme) -> ValidatorResult<()> {
        if self.header.quantization != expected {
            return Err(ValidatorError::schema(
                "SCHEMA.QUANTIZATION_SCHEME",
                format!(
                    "artifact '{}' was quantized with {}, expected {}",
                    self.source.display(),
                    self.header.quantization,
                    expected
                ),
            ));
        }
        Ok(())
    }

    /// Decode a hits table keyed by `(event_id, index)`.
    pub fn hits_table(&self, name: &str) -> ValidatorResult<EncodedTable> {
        let value = self.table_value(name)?;
        let object = value.as_object().ok_or_else(|| {
            ValidatorError::schema(
                "SCHEMA.TABLE_SHAPE",
                format!(
                    "table '{}' in '{}' is not a column map",
                    name,
                    self.source.display()
                ),
            )
        })?;

        if let Some(missing) = HIT_KEY_COLUMNS.iter().find(|key| !object.contains_key(**key)) {
            return Err(ValidatorError::index_structure(
                "INDEX.MISSING_KEY",
                format!(
                    "table '{}' in '{}' must be keyed by (event_id, index), missing '{}'",
                    name,
                    self.source.display(),
                    missing
                ),
            ));
        }
        if let Some(missing) = HIT_REQUIRED_COLUMNS
            .iter()
            .find(|column| !object.contains_key(**column))
        {
            return Err(self.missing_column(name, missing));
        }
        let residual_present = HIT_RESIDUAL_COLUMNS
            .iter()
            .filter(|column| object.contains_key(**column))
            .count();
        if residual_present != 0 && residual_present != HIT_RESIDUAL_COLUMNS.len() {
            let missing = HIT_RESIDUAL_COLUMNS
                .iter()
                .find(|column| !object.contains_key(**column))
                .copied()
                .unwrap_or("deltapxq");
            return Err(self.missing_column(name, missing));
        }

        let columns: HitColumns = serde_json::from_value(value.clone()).map_err(|source| {
            ValidatorError::schema(
                "SCHEMA.COLUMN_TYPE",
                format!(
                    "table '{}' in '{}' has malformed columns: {}",
                    name,
                    self.source.display(),
                    source
                ),
            )
        })?;
        EncodedTable::from_columns(name, columns)
    }

    pub fn metadata(&self) -> ValidatorResult<Metadata> {
        let value = self.table_value(METADATA_TABLE)?;
        let columns: MetadataColumns = serde_json::from_value(value.clone()).map_err(|source| {
            ValidatorError::schema(
                "SCHEMA.COLUMN_TYPE",
                format!(
                    "table '{}' in '{}' has malformed columns: {}",
                    METADATA_TABLE,
                    self.source.display(),
                    source
                ),
            )
        })?;
        Metadata::from_columns(columns)
    }

    fn table_value(&self, name: &str) -> ValidatorResult<&Value> {
        self.tables.get(name).ok_or_else(|| {
            ValidatorError::schema(
                "SCHEMA.MISSING_TABLE",
                format!(
                    "artifact '{}' has no table '{}'",
                    self.source.display(),
                    name
                ),
            )
        })
    }

    fn missing_column(&self, table: &str, column: &str) -> ValidatorError {
        ValidatorError::schema(
            "SCHEMA.MISSING_COLUMN",
            format!(
                "table '{}' in '{}' is missing column '{}'",
                table,
                self.source.display(),
                column
            ),
        )
    }
}

/// Serialize `value` next to `path` and rename into place, so readers never
/// observe a partially written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    placeholder: &'static str,
) -> ValidatorResult<()> {
    let io_error = |action: &str, source: &dyn std::fmt::Display| {
        ValidatorError::io_system(
            placeholder,
            format!("failed to {} '{}': {}", action, path.display(), source),
        )
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|source| io_error("create directory for", &source))?;

    let mut staged = tempfile::NamedTempFile::new_in(&directory)
        .map_err(|source| io_error("stage", &source))?;
    serde_json::to_writer(&mut staged, value).map_err(|source| io_error("encode", &source))?;
    staged.flush().map_err(|source| io_error("flush", &source))?;
    staged
        .persist(path)
        .map_err(|source| io_error("rename into", &source.error))?;
    Ok(())
}

/// Re-read an exported artifact and compare it against what was written.
pub fn verify_export(
    path: impl AsRef<Path>,
    expected_header: &ArtifactHeader,
    expected_hits: &EncodedTable,
    expected_metadata: &Metadata,
) -> ValidatorResult<()> {
    let path = path.as_ref();
    let artifact = Artifact::read(path)?;
    let mismatch = |what: String| {
        ValidatorError::internal(
            "INTERNAL.EXPORT_VERIFY",
            format!("read-back of '{}' differs: {}", path.display(), what),
        )
    };

    if artifact.header != *expected_header {
        return Err(mismatch(format!(
            "header {:?} != {:?}",
            artifact.header, expected_header
        )));
    }

    let hits = artifact.hits_table(HITS_TABLE)?;
    if hits.len() != expected_hits.len() {
        return Err(mismatch(format!(
            "{} rows read, {} written",
            hits.len(),
            expected_hits.len()
        )));
    }
    if let Some((read, written)) = hits
        .rows()
        .iter()
        .zip(expected_hits.rows())
        .find(|(read, written)| !rows_identical(read, written))
    {
        return Err(mismatch(format!(
            "row (event {}, index {}) read back as (event {}, index {})",
            written.event_id, written.index, read.event_id, read.index
        )));
    }

    let metadata = artifact.metadata()?;
    let same_metadata = metadata.entries().len() == expected_metadata.entries().len()
        && metadata
            .entries()
            .iter()
            .zip(expected_metadata.entries())
            .all(|((read_column, read), (written_column, written))| {
                read_column == written_column
                    && same_float(read.min, written.min)
                    && same_float(read.max, written.max)
                    && same_float(read.mean, written.mean)
                    && same_float(read.std, written.std)
            });
    if !same_metadata {
        return Err(mismatch("metadata table".to_string()));
    }

    debug!(path = %path.display(), rows = hits.len(), "artifact verified");
    Ok(())
}

fn same_float(lhs: f64, rhs: f64) -> bool {
    lhs == rhs || (lhs.is_nan() && rhs.is_nan())
}

fn rows_identical(lhs: &crate::table::EncodedRow, rhs: &crate::table::EncodedRow) -> bool {
    lhs.key() == rhs.key()
        && lhs.geometry_id == rhs.geometry_id
        && lhs.particle_type == rhs.particle_type
        && same_float(lhs.lxq, rhs.lxq)
        && same_float(lhs.lyq, rhs.lyq)
        && same_float(lhs.tpxq, rhs.tpxq)
        && same_float(lhs.tpyq, rhs.tpyq)
        && same_float(lhs.tpzq, rhs.tpzq)
}

#[cfg(test)]
mod tests {
    use super::{Artifact, ArtifactHeader, HITS_TABLE, verify_export};
    use crate::codec::{QuantizationScheme, RecordCodec};
    use crate::domain::ErrorCategory;
    use crate::table::{EncodedRow, EncodedTable, Metadata};
    use std::fs;
    use tempfile::TempDir;

    fn table() -> EncodedTable {
        EncodedTable::new(vec![
            EncodedRow {
                event_id: 0,
                index: 0,
                geometry_id: 1_000_000,
                particle_type: Some(13),
                lxq: 0.01,
                lyq: 25.0,
                tpxq: 1.23,
                tpyq: -0.4,
                tpzq: 10.0,
                residual: None,
            },
            EncodedRow {
                event_id: 0,
                index: 1,
                geometry_id: 42,
                particle_type: None,
                lxq: f64::NAN,
                lyq: -3.21,
                tpxq: 1.2,
                tpyq: -0.41,
                tpzq: 9.99,
                residual: None,
            },
        ])
    }

    fn written_artifact(path: &std::path::Path) -> (ArtifactHeader, EncodedTable, Metadata) {
        let header = ArtifactHeader::for_codec(&RecordCodec::default());
        let hits = table();
        let metadata = Metadata::compute(&hits);
        let mut artifact = Artifact::new(header);
        artifact.insert_hits(HITS_TABLE, &hits).expect("encode hits");
        artifact.insert_metadata(&metadata).expect("encode metadata");
        artifact.write_atomic(path).expect("write artifact");
        (header, hits, metadata)
    }

    #[test]
    fn written_artifact_verifies() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("hits/1.encoded.json");
        let (header, hits, metadata) = written_artifact(&path);

        verify_export(&path, &header, &hits, &metadata).expect("read-back matches");
        let artifact = Artifact::read(&path).expect("readable");
        assert!(artifact.header.end_vertex_quirk);
        assert_eq!(artifact.table_names().collect::<Vec<_>>(), vec!["hits", "metadata"]);
        let leftovers = fs::read_dir(temp.path().join("hits")).expect("list").count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn verification_detects_tampering() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("1.encoded.json");
        let (header, hits, metadata) = written_artifact(&path);

        let content = fs::read_to_string(&path).expect("read");
        fs::write(&path, content.replace("-3.21", "-3.2")).expect("tamper");
        let error = verify_export(&path, &header, &hits, &metadata).expect_err("tampered");
        assert_eq!(error.category(), ErrorCategory::Internal);
    }

    #[test]
    fn scheme_mismatch_is_a_schema_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("1.encoded.json");
        written_artifact(&path);

        let artifact = Artifact::read(&path).expect("readable");
        artifact
            .expect_scheme(QuantizationScheme::RoundThenTruncate)
            .expect("matching scheme");
        let error = artifact
            .expect_scheme(QuantizationScheme::TruncateTowardZero)
            .expect_err("mixed schemes");
        assert_eq!(error.category(), ErrorCategory::SchemaMismatch);
    }

    #[test]
    fn missing_columns_are_reported_by_category() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("model.json");
        fs::write(
            &path,
            r#"{
              "header": {
                "format_version": 1,
                "quantization": "round_then_truncate",
                "sentinels": {"start": 1000000, "end": 1000001},
                "end_vertex_quirk": true
              },
              "tables": {
                "reference_data": {"event_id": [0], "geometry_id": [5]},
                "generated_data": {"event_id": [0], "index": [1], "geometry_id": [5],
                                   "particle_type": [13], "lxq": [0.1], "lyq": [0.2]}
              }
            }"#,
        )
        .expect("write model output");

        let artifact = Artifact::read(&path).expect("readable");
        let error = artifact.hits_table("reference_data").expect_err("no index");
        assert_eq!(error.category(), ErrorCategory::IndexStructure);

        let error = artifact.hits_table("generated_data").expect_err("no momentum");
        assert_eq!(error.category(), ErrorCategory::SchemaMismatch);
        assert!(error.message().contains("'tpxq'"));

        let error = artifact.hits_table("absent").expect_err("no table");
        assert_eq!(error.placeholder(), "SCHEMA.MISSING_TABLE");
    }
}
