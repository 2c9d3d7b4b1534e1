//! JSON run configuration shared by all commands.

use crate::codec::{EndVertexMode, QuantizationScheme, RecordCodec};
use crate::domain::{PRIMARY_BARCODE, Sentinels, ValidatorError, ValidatorResult};
use crate::geometry::{GeometryHandle, PlanarSurfaceGeometry};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_ENV_VAR: &str = "SILICONAI_VALIDATOR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "siliconai_validator.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Root of the simulation outputs; relative paths resolve against the
    /// directory of the configuration file.
    pub output_path: PathBuf,
    pub output_name: String,
    pub geometry_file: Option<PathBuf>,
    pub threads: usize,
    pub fixed_length: bool,
    pub quantization: QuantizationScheme,
    pub sentinels: Sentinels,
    pub end_vertex: EndVertexMode,
    pub primary_barcode: u64,
    pub events: Option<u64>,
    pub labels: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output"),
            output_name: "siliconai".to_string(),
            geometry_file: None,
            threads: 4,
            fixed_length: false,
            quantization: QuantizationScheme::default(),
            sentinels: Sentinels::default(),
            end_vertex: EndVertexMode::default(),
            primary_barcode: PRIMARY_BARCODE,
            events: None,
            labels: Vec::new(),
        }
    }
}

impl ValidatorConfig {
    pub fn from_path(path: impl AsRef<Path>) -> ValidatorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            ValidatorError::io_system(
                "IO.CONFIG_READ",
                format!("failed to read configuration '{}': {}", path.display(), source),
            )
        })?;
        let mut config = Self::from_json_str(&content).map_err(|error| {
            ValidatorError::new(
                error.category(),
                error.placeholder(),
                format!("configuration '{}': {}", path.display(), error.message()),
            )
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> ValidatorResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|source| {
            ValidatorError::schema("CONFIG.PARSE", format!("invalid configuration: {}", source))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ValidatorResult<()> {
        self.sentinels.validate()?;
        if self.threads == 0 {
            return Err(ValidatorError::schema(
                "CONFIG.THREADS",
                "threads must be at least 1",
            ));
        }
        if self.output_name.trim().is_empty() {
            return Err(ValidatorError::schema(
                "CONFIG.OUTPUT_NAME",
                "output_name must not be empty",
            ));
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if self.output_path.is_relative() {
            self.output_path = base.join(&self.output_path);
        }
        if let Some(geometry) = self.geometry_file.as_mut().filter(|path| path.is_relative()) {
            *geometry = base.join(&*geometry);
        }
    }

    pub fn codec(&self) -> RecordCodec {
        RecordCodec::new(self.quantization, self.sentinels).with_end_vertex_mode(self.end_vertex)
    }

    /// Load the surface placements once; the handle is shared by every shard.
    pub fn load_geometry(&self) -> ValidatorResult<GeometryHandle> {
        let path = self.geometry_file.as_ref().ok_or_else(|| {
            ValidatorError::schema(
                "CONFIG.GEOMETRY",
                "geometry_file must point to a surface placement dump",
            )
        })?;
        Ok(Arc::new(PlanarSurfaceGeometry::from_path(path)?))
    }

    /// Create `path` with the default configuration. An existing file is
    /// never replaced.
    pub fn write_default(path: impl AsRef<Path>) -> ValidatorResult<()> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| {
            ValidatorError::io_system(
                "IO.CONFIG_WRITE",
                format!("failed to write configuration '{}': {}", path.display(), source),
            )
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    ValidatorError::io_system(
                        "IO.CONFIG_EXISTS",
                        format!("configuration '{}' already exists", path.display()),
                    )
                } else {
                    io_error(source)
                }
            })?;
        let content = serde_json::to_string_pretty(&Self::default()).map_err(|source| {
            ValidatorError::internal("INTERNAL.CONFIG_ENCODE", source.to_string())
        })?;
        file.write_all(content.as_bytes()).map_err(io_error)?;
        file.write_all(b"\n").map_err(io_error)?;
        Ok(())
    }
}
