use super::{GeometryLookupError, SurfaceGeometry};
use crate::domain::{ValidatorError, ValidatorResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Rigid placement of a planar sensor. The rotation columns are the local
/// x, y and normal axes expressed in the global frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SurfacePlacement {
    pub center: [f64; 3],
    pub rotation: [[f64; 3]; 3],
}

impl SurfacePlacement {
    pub fn new(center: [f64; 3], rotation: [[f64; 3]; 3]) -> Self {
        Self { center, rotation }
    }

    fn to_local(&self, global: [f64; 3]) -> [f64; 2] {
        let delta = [
            global[0] - self.center[0],
            global[1] - self.center[1],
            global[2] - self.center[2],
        ];
        let axis = |column: usize| {
            self.rotation[0][column] * delta[0]
                + self.rotation[1][column] * delta[1]
                + self.rotation[2][column] * delta[2]
        };
        [axis(0), axis(1)]
    }

    fn to_global(&self, local: [f64; 2]) -> [f64; 3] {
        let row = |row: usize| {
            self.center[row] + self.rotation[row][0] * local[0] + self.rotation[row][1] * local[1]
        };
        [row(0), row(1), row(2)]
    }

    fn is_finite(&self) -> bool {
        self.center.iter().all(|value| value.is_finite())
            && self
                .rotation
                .iter()
                .flatten()
                .all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanarSurfaceGeometry {
    surfaces: HashMap<u64, SurfacePlacement>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    surfaces: Vec<RawSurface>,
}

#[derive(Debug, Deserialize)]
struct RawSurface {
    geometry_id: u64,
    #[serde(flatten)]
    placement: SurfacePlacement,
}

impl PlanarSurfaceGeometry {
    pub fn from_path(path: impl AsRef<Path>) -> ValidatorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            ValidatorError::io_system(
                "IO.GEOMETRY_READ",
                format!("failed to read geometry '{}': {}", path.display(), source),
            )
        })?;
        Self::from_json_str(&content).map_err(|error| {
            ValidatorError::schema(
                error.placeholder(),
                format!("geometry '{}': {}", path.display(), error.message()),
            )
        })
    }

    pub fn from_json_str(content: &str) -> ValidatorResult<Self> {
        let raw: RawGeometry = serde_json::from_str(content).map_err(|source| {
            ValidatorError::schema(
                "SCHEMA.GEOMETRY_PARSE",
                format!("failed to parse surface placements: {}", source),
            )
        })?;

        let mut geometry = Self::default();
        for surface in raw.surfaces {
            geometry.insert(surface.geometry_id, surface.placement)?;
        }
        Ok(geometry)
    }

    pub fn insert(&mut self, geometry_id: u64, placement: SurfacePlacement) -> ValidatorResult<()> {
        if geometry_id == 0 {
            return Err(ValidatorError::schema(
                "SCHEMA.GEOMETRY_SURFACE",
                "geometry id 0 is reserved and cannot carry a surface",
            ));
        }
        if !placement.is_finite() {
            return Err(ValidatorError::schema(
                "SCHEMA.GEOMETRY_SURFACE",
                format!("surface {} has a non-finite placement", geometry_id),
            ));
        }
        if self.surfaces.insert(geometry_id, placement).is_some() {
            return Err(ValidatorError::schema(
                "SCHEMA.GEOMETRY_SURFACE",
                format!("surface {} is defined more than once", geometry_id),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn contains(&self, geometry_id: u64) -> bool {
        self.surfaces.contains_key(&geometry_id)
    }

    fn placement(&self, geometry_id: u64) -> Result<&SurfacePlacement, GeometryLookupError> {
        self.surfaces
            .get(&geometry_id)
            .ok_or(GeometryLookupError::UnknownSurface { geometry_id })
    }
}

impl SurfaceGeometry for PlanarSurfaceGeometry {
    fn global_to_local(
        &self,
        geometry_id: u64,
        global: [f64; 3],
    ) -> Result<[f64; 2], GeometryLookupError> {
        Ok(self.placement(geometry_id)?.to_local(global))
    }

    fn local_to_global(
        &self,
        geometry_id: u64,
        local: [f64; 2],
    ) -> Result<[f64; 3], GeometryLookupError> {
        Ok(self.placement(geometry_id)?.to_global(local))
    }
}

#[cfg(test)]
mod tests {
    use super::{PlanarSurfaceGeometry, SurfacePlacement};
    use crate::domain::ErrorCategory;
    use crate::geometry::SurfaceGeometry;
    use std::fs;
    use tempfile::TempDir;

    const ENDCAP: &str = r#"
    {
      "surfaces": [
        {
          "geometry_id": 576460752303423488,
          "center": [10.0, -5.0, 600.0],
          "rotation": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        }
      ]
    }
    "#;

    #[test]
    fn geometry_dump_is_parsed_and_queried() {
        let geometry = PlanarSurfaceGeometry::from_json_str(ENDCAP).expect("valid dump");
        assert_eq!(geometry.len(), 1);

        let local = geometry
            .global_to_local(576460752303423488, [12.5, -4.0, 600.0])
            .expect("known surface");
        assert_eq!(local, [2.5, 1.0]);
        let global = geometry
            .local_to_global(576460752303423488, local)
            .expect("known surface");
        assert_eq!(global, [12.5, -4.0, 600.0]);
    }

    #[test]
    fn duplicate_surfaces_are_rejected() {
        let mut geometry = PlanarSurfaceGeometry::default();
        let placement = SurfacePlacement::new(
            [0.0; 3],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        geometry.insert(5, placement).expect("first insert");
        let error = geometry.insert(5, placement).expect_err("duplicate insert");
        assert_eq!(error.category(), ErrorCategory::SchemaMismatch);
        assert!(geometry.insert(0, placement).is_err());
    }

    #[test]
    fn geometry_file_errors_name_the_path() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("geometry.json");
        fs::write(&path, "{\"surfaces\": 3}").expect("write geometry");

        let error = PlanarSurfaceGeometry::from_path(&path).expect_err("malformed dump");
        assert!(error.message().contains("geometry.json"));

        let missing = PlanarSurfaceGeometry::from_path(temp.path().join("absent.json"))
            .expect_err("missing file");
        assert_eq!(missing.category(), ErrorCategory::IoSystem);
    }
}
