//! Columnar JSON layout of the persisted tables.
//!
//! JSON has no NaN, so missing floating values travel as `null`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub(crate) mod nan_as_null {
    use super::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Option<f64>> = values
            .iter()
            .map(|value| (!value.is_nan()).then_some(*value))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let decoded = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(decoded
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }
}

pub(crate) mod nan_as_null_f32 {
    use super::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Option<f32>> = values
            .iter()
            .map(|value| (!value.is_nan()).then_some(*value))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let decoded = Vec::<Option<f32>>::deserialize(deserializer)?;
        Ok(decoded
            .into_iter()
            .map(|value| value.unwrap_or(f32::NAN))
            .collect())
    }
}

pub const HIT_KEY_COLUMNS: [&str; 2] = ["event_id", "index"];
pub const HIT_REQUIRED_COLUMNS: [&str; 7] = [
    "geometry_id",
    "particle_type",
    "lxq",
    "lyq",
    "tpxq",
    "tpyq",
    "tpzq",
];
pub const HIT_RESIDUAL_COLUMNS: [&str; 3] = ["deltapxq", "deltapyq", "deltapzq"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HitColumns {
    pub event_id: Vec<u32>,
    pub index: Vec<i32>,
    pub geometry_id: Vec<u64>,
    pub particle_type: Vec<Option<i32>>,
    #[serde(with = "nan_as_null")]
    pub lxq: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub lyq: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub tpxq: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub tpyq: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub tpzq: Vec<f64>,
    #[serde(default, with = "nan_as_null", skip_serializing_if = "Vec::is_empty")]
    pub deltapxq: Vec<f64>,
    #[serde(default, with = "nan_as_null", skip_serializing_if = "Vec::is_empty")]
    pub deltapyq: Vec<f64>,
    #[serde(default, with = "nan_as_null", skip_serializing_if = "Vec::is_empty")]
    pub deltapzq: Vec<f64>,
}

impl HitColumns {
    /// Model output may carry a per-hit momentum correction.
    pub fn has_residual(&self) -> bool {
        !(self.deltapxq.is_empty() && self.deltapyq.is_empty() && self.deltapzq.is_empty())
    }

    /// Name of the first column whose length differs from `event_id`.
    pub fn ragged_column(&self) -> Option<&'static str> {
        let rows = self.event_id.len();
        let mut lengths = vec![
            ("index", self.index.len()),
            ("geometry_id", self.geometry_id.len()),
            ("particle_type", self.particle_type.len()),
            ("lxq", self.lxq.len()),
            ("lyq", self.lyq.len()),
            ("tpxq", self.tpxq.len()),
            ("tpyq", self.tpyq.len()),
            ("tpzq", self.tpzq.len()),
        ];
        if self.has_residual() {
            lengths.extend([
                ("deltapxq", self.deltapxq.len()),
                ("deltapyq", self.deltapyq.len()),
                ("deltapzq", self.deltapzq.len()),
            ]);
        }
        lengths
            .into_iter()
            .find(|(_, length)| *length != rows)
            .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataColumns {
    pub column: Vec<String>,
    #[serde(with = "nan_as_null")]
    pub min: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub max: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub mean: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub std: Vec<f64>,
}
