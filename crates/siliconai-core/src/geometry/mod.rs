//! Global ↔ sensor-local coordinate conversion.
//!
//! The detector description itself is external; this module only needs the
//! placement of every sensitive surface. A geometry handle is built once per
//! process and shared by reference counting between all conversions.

mod placement;

pub use placement::{PlanarSurfaceGeometry, SurfacePlacement};

use crate::domain::{Sentinels, ValidatorError};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

const REPORTED_FAILED_IDS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryLookupError {
    #[error("no sensitive surface with geometry id {geometry_id}")]
    UnknownSurface { geometry_id: u64 },
}

impl From<GeometryLookupError> for ValidatorError {
    fn from(error: GeometryLookupError) -> Self {
        ValidatorError::geometry("GEOMETRY.UNKNOWN_SURFACE", error.to_string())
    }
}

pub trait SurfaceGeometry: Send + Sync {
    fn global_to_local(
        &self,
        geometry_id: u64,
        global: [f64; 3],
    ) -> Result<[f64; 2], GeometryLookupError>;

    fn local_to_global(
        &self,
        geometry_id: u64,
        local: [f64; 2],
    ) -> Result<[f64; 3], GeometryLookupError>;
}

pub type GeometryHandle = Arc<dyn SurfaceGeometry>;

/// Outcome of a vectorized conversion. Rows whose surface lookup failed carry
/// NaN coordinates and are counted instead of aborting the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkConversion<T> {
    pub values: Vec<T>,
    pub failures: usize,
    pub failed_ids: BTreeSet<u64>,
}

impl<T> BulkConversion<T> {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

#[derive(Clone)]
pub struct CoordinateTransform {
    geometry: GeometryHandle,
    vertex_sentinels: Option<Sentinels>,
}

impl CoordinateTransform {
    pub fn new(geometry: GeometryHandle) -> Self {
        Self {
            geometry,
            vertex_sentinels: None,
        }
    }

    /// Treat the vertex sentinels like geometry id 0: they never reach the
    /// geometry service.
    pub fn with_vertex_short_circuit(mut self, sentinels: Sentinels) -> Self {
        self.vertex_sentinels = Some(sentinels);
        self
    }

    fn has_no_surface(&self, geometry_id: u64) -> bool {
        geometry_id == 0
            || self
                .vertex_sentinels
                .is_some_and(|sentinels| sentinels.is_sentinel(geometry_id))
    }

    pub fn global_to_local(
        &self,
        geometry_id: u64,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(f64, f64), GeometryLookupError> {
        if self.has_no_surface(geometry_id) {
            return Ok((0.0, 0.0));
        }
        let [lx, ly] = self.geometry.global_to_local(geometry_id, [x, y, z])?;
        Ok((lx, ly))
    }

    pub fn local_to_global(
        &self,
        geometry_id: u64,
        lx: f64,
        ly: f64,
    ) -> Result<(f64, f64, f64), GeometryLookupError> {
        if self.has_no_surface(geometry_id) {
            return Ok((0.0, 0.0, 0.0));
        }
        let [x, y, z] = self.geometry.local_to_global(geometry_id, [lx, ly])?;
        Ok((x, y, z))
    }

    pub fn global_to_local_bulk(&self, rows: &[(u64, [f64; 3])]) -> BulkConversion<[f64; 2]> {
        let converted: Vec<Result<[f64; 2], GeometryLookupError>> = rows
            .par_iter()
            .map(|(geometry_id, [x, y, z])| {
                self.global_to_local(*geometry_id, *x, *y, *z)
                    .map(|(lx, ly)| [lx, ly])
            })
            .collect();
        collect_bulk(converted, [f64::NAN; 2], "global_to_local")
    }

    pub fn local_to_global_bulk(&self, rows: &[(u64, [f64; 2])]) -> BulkConversion<[f64; 3]> {
        let converted: Vec<Result<[f64; 3], GeometryLookupError>> = rows
            .par_iter()
            .map(|(geometry_id, [lx, ly])| {
                self.local_to_global(*geometry_id, *lx, *ly)
                    .map(|(x, y, z)| [x, y, z])
            })
            .collect();
        collect_bulk(converted, [f64::NAN; 3], "local_to_global")
    }
}

fn collect_bulk<T: Copy>(
    converted: Vec<Result<T, GeometryLookupError>>,
    fallback: T,
    direction: &str,
) -> BulkConversion<T> {
    let mut values = Vec::with_capacity(converted.len());
    let mut failures = 0usize;
    let mut failed_ids = BTreeSet::new();
    for result in converted {
        match result {
            Ok(value) => values.push(value),
            Err(GeometryLookupError::UnknownSurface { geometry_id }) => {
                failures += 1;
                if failed_ids.len() < REPORTED_FAILED_IDS {
                    failed_ids.insert(geometry_id);
                }
                values.push(fallback);
            }
        }
    }

    if failures > 0 {
        warn!(
            direction,
            failures,
            rows = values.len(),
            sample_ids = ?failed_ids,
            "geometry lookups failed, affected rows carry NaN coordinates"
        );
    }

    BulkConversion {
        values,
        failures,
        failed_ids,
    }
}
