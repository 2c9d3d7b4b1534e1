pub mod errors;

pub use errors::{ErrorCategory, ValidatorError, ValidatorResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Barcode of the first primary particle of the first primary vertex.
pub const PRIMARY_BARCODE: u64 = 4_503_599_644_147_712;
pub const MUON_MASS_GEV: f64 = 0.10566;
pub const DEFAULT_GEOMETRY_ID_START: u64 = 1_000_000;
pub const DEFAULT_GEOMETRY_ID_END: u64 = 1_000_001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sentinels {
    pub start: u64,
    pub end: u64,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            start: DEFAULT_GEOMETRY_ID_START,
            end: DEFAULT_GEOMETRY_ID_END,
        }
    }
}

impl Sentinels {
    pub fn validate(&self) -> ValidatorResult<()> {
        if self.start == 0 || self.end == 0 {
            return Err(ValidatorError::schema(
                "CONFIG.SENTINELS",
                "vertex sentinels must not use geometry id 0",
            ));
        }
        if self.start == self.end {
            return Err(ValidatorError::schema(
                "CONFIG.SENTINELS",
                format!(
                    "start and end vertex sentinels must differ, both are {}",
                    self.start
                ),
            ));
        }
        Ok(())
    }

    pub const fn is_sentinel(&self, geometry_id: u64) -> bool {
        geometry_id == self.start || geometry_id == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub event_id: u32,
    pub particle_type: i32,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub number_of_hits: u32,
}

impl ParticleRecord {
    pub fn vr(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantizedColumns {
    pub lxq: f64,
    pub lyq: f64,
    pub tpxq: f64,
    pub tpyq: f64,
    pub tpzq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub event_id: u32,
    pub geometry_id: u64,
    pub index: i32,
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub tpx: f64,
    pub tpy: f64,
    pub tpz: f64,
    pub lx: f64,
    pub ly: f64,
    pub quantized: QuantizedColumns,
}

impl HitRecord {
    pub fn key(&self) -> (u32, i32) {
        (self.event_id, self.index)
    }

    pub fn tr(&self) -> f64 {
        self.tx.hypot(self.ty)
    }
}

/// One row of a built sequence: a hit or vertex pseudo-hit with the owning
/// particle's scalar attributes broadcast onto it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceRow {
    pub hit: HitRecord,
    pub particle_type: Option<i32>,
    pub number_of_hits: Option<u32>,
}

/// Floating columns of the persisted hits table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatColumn {
    Lxq,
    Lyq,
    Tpxq,
    Tpyq,
    Tpzq,
    Deltapxq,
    Deltapyq,
    Deltapzq,
}

impl FloatColumn {
    pub const QUANTIZED: [FloatColumn; 5] =
        [Self::Lxq, Self::Lyq, Self::Tpxq, Self::Tpyq, Self::Tpzq];
    pub const RESIDUAL: [FloatColumn; 3] = [Self::Deltapxq, Self::Deltapyq, Self::Deltapzq];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lxq => "lxq",
            Self::Lyq => "lyq",
            Self::Tpxq => "tpxq",
            Self::Tpyq => "tpyq",
            Self::Tpzq => "tpzq",
            Self::Deltapxq => "deltapxq",
            Self::Deltapyq => "deltapyq",
            Self::Deltapzq => "deltapzq",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::QUANTIZED
            .into_iter()
            .chain(Self::RESIDUAL)
            .find(|column| column.as_str() == name)
    }
}

impl Display for FloatColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}
