//! Fixed-point encoding of hits and of particle vertices posing as hits.

mod quantize;

pub use quantize::{QuantizationError, QuantizationScheme, quantize};

use crate::domain::{
    FloatColumn, HitRecord, ParticleRecord, QuantizedColumns, Sentinels, ValidatorError,
    ValidatorResult, VertexKind,
};
use serde::{Deserialize, Serialize};

/// Scale of the synthetic start-vertex `ly`: `tz / max|tz|` is mapped onto
/// `[-50, 50]`.
pub const START_VERTEX_LY_SCALE: f64 = 50.0;

/// Layout of the end-vertex pseudo-hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndVertexMode {
    /// `tz`, `lx` and `ly` all carry `tx`, as in every dataset exported so far.
    #[default]
    Preserved,
    /// Same local layout as the start vertex, `tz` untouched.
    Corrected,
}

impl EndVertexMode {
    pub const fn is_quirk(self) -> bool {
        matches!(self, Self::Preserved)
    }
}

/// A quantized column of one row that could not be filled.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("event {event_id} index {index} column '{column}': {source}")]
pub struct ColumnOverflow {
    pub event_id: u32,
    pub index: i32,
    pub column: FloatColumn,
    pub source: QuantizationError,
}

impl From<ColumnOverflow> for ValidatorError {
    fn from(error: ColumnOverflow) -> Self {
        ValidatorError::quantization("QUANT.OVERFLOW", error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordCodec {
    scheme: QuantizationScheme,
    sentinels: Sentinels,
    end_vertex: EndVertexMode,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(QuantizationScheme::default(), Sentinels::default())
    }
}

impl RecordCodec {
    pub fn new(scheme: QuantizationScheme, sentinels: Sentinels) -> Self {
        Self {
            scheme,
            sentinels,
            end_vertex: EndVertexMode::default(),
        }
    }

    pub fn with_end_vertex_mode(mut self, end_vertex: EndVertexMode) -> Self {
        self.end_vertex = end_vertex;
        self
    }

    pub const fn scheme(&self) -> QuantizationScheme {
        self.scheme
    }

    pub const fn sentinels(&self) -> Sentinels {
        self.sentinels
    }

    pub const fn end_vertex_mode(&self) -> EndVertexMode {
        self.end_vertex
    }

    pub fn quantize(&self, value: f64) -> Result<f64, QuantizationError> {
        quantize(value, self.scheme)
    }

    /// Fill the quantized columns of `hit` from its local position and
    /// momentum.
    pub fn encode_hit(&self, mut hit: HitRecord) -> ValidatorResult<HitRecord> {
        let quantize_column = |column: FloatColumn, value: f64| {
            self.quantize(value).map_err(|source| ColumnOverflow {
                event_id: hit.event_id,
                index: hit.index,
                column,
                source,
            })
        };

        hit.quantized = QuantizedColumns {
            lxq: quantize_column(FloatColumn::Lxq, hit.lx)?,
            lyq: quantize_column(FloatColumn::Lyq, hit.ly)?,
            tpxq: quantize_column(FloatColumn::Tpxq, hit.tpx)?,
            tpyq: quantize_column(FloatColumn::Tpyq, hit.tpy)?,
            tpzq: quantize_column(FloatColumn::Tpzq, hit.tpz)?,
        };
        Ok(hit)
    }

    /// Turn the production vertices of `particles` into encoded pseudo-hits.
    ///
    /// The start-vertex `ly` is normalised by the largest `|vz|` of the whole
    /// batch, so the result depends on which particles are passed together.
    pub fn vertex_hits(
        &self,
        particles: &[ParticleRecord],
        kind: VertexKind,
    ) -> ValidatorResult<Vec<HitRecord>> {
        let max_abs_z = particles
            .iter()
            .map(|particle| particle.vz.abs())
            .filter(|value| !value.is_nan())
            .fold(0.0_f64, f64::max);

        particles
            .iter()
            .map(|particle| self.encode_hit(self.vertex_hit(particle, kind, max_abs_z)?))
            .collect()
    }

    fn vertex_hit(
        &self,
        particle: &ParticleRecord,
        kind: VertexKind,
        max_abs_z: f64,
    ) -> ValidatorResult<HitRecord> {
        let (geometry_id, index) = match kind {
            VertexKind::Start => (self.sentinels.start, 0),
            VertexKind::End => {
                let index = i32::try_from(u64::from(particle.number_of_hits) + 1).map_err(|_| {
                    ValidatorError::index_structure(
                        "INDEX.END_VERTEX",
                        format!(
                            "event {} has {} hits, which overflows the hit index",
                            particle.event_id, particle.number_of_hits
                        ),
                    )
                })?;
                (self.sentinels.end, index)
            }
        };

        let mut hit = HitRecord {
            event_id: particle.event_id,
            geometry_id,
            index,
            tx: particle.vx,
            ty: particle.vy,
            tz: particle.vz,
            tpx: particle.px,
            tpy: particle.py,
            tpz: particle.pz,
            lx: 0.0,
            ly: 0.0,
            quantized: QuantizedColumns::default(),
        };

        let start_layout = |hit: &mut HitRecord| {
            hit.lx = hit.tx;
            hit.ly = if max_abs_z > 0.0 {
                hit.tz / max_abs_z * START_VERTEX_LY_SCALE
            } else {
                0.0
            };
        };

        match (kind, self.end_vertex) {
            (VertexKind::Start, _) | (VertexKind::End, EndVertexMode::Corrected) => {
                start_layout(&mut hit)
            }
            (VertexKind::End, EndVertexMode::Preserved) => {
                hit.tz = hit.tx;
                hit.lx = hit.tx;
                hit.ly = hit.tx;
            }
        }
        Ok(hit)
    }
}
