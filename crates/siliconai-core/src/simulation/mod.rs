//! Readers for the per-shard particle and hit records written by the
//! detector simulation.

use crate::domain::{HitRecord, ParticleRecord, QuantizedColumns, ValidatorError, ValidatorResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub const PARTICLES_TREE: &str = "particles";
pub const HITS_TREE: &str = "hits";

/// Per-event particle lists; entry 0 of every list is the primary.
#[derive(Debug, Deserialize)]
struct ParticleColumns {
    event_id: Vec<u32>,
    particle_type: Vec<Vec<i32>>,
    vx: Vec<Vec<f64>>,
    vy: Vec<Vec<f64>>,
    vz: Vec<Vec<f64>>,
    px: Vec<Vec<f64>>,
    py: Vec<Vec<f64>>,
    pz: Vec<Vec<f64>>,
    number_of_hits: Vec<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
struct HitColumns {
    event_id: Vec<u32>,
    geometry_id: Vec<u64>,
    particle_id: Vec<u64>,
    index: Vec<i32>,
    tx: Vec<f64>,
    ty: Vec<f64>,
    tz: Vec<f64>,
    tpx: Vec<f64>,
    tpy: Vec<f64>,
    tpz: Vec<f64>,
    deltapx: Vec<f64>,
    deltapy: Vec<f64>,
    deltapz: Vec<f64>,
}

fn read_tree<T: DeserializeOwned>(path: &Path, tree: &str) -> ValidatorResult<T> {
    let content = fs::read_to_string(path).map_err(|source| {
        ValidatorError::io_system(
            "IO.SIMULATION_READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })?;
    let mut document: serde_json::Value = serde_json::from_str(&content).map_err(|source| {
        ValidatorError::schema(
            "SCHEMA.SIMULATION_PARSE",
            format!("failed to parse '{}': {}", path.display(), source),
        )
    })?;
    let columns = document
        .get_mut(tree)
        .map(serde_json::Value::take)
        .ok_or_else(|| {
            ValidatorError::schema(
                "SCHEMA.MISSING_TABLE",
                format!("'{}' has no '{}' tree", path.display(), tree),
            )
        })?;
    serde_json::from_value(columns).map_err(|source| {
        ValidatorError::schema(
            "SCHEMA.MISSING_COLUMN",
            format!("'{}' tree '{}': {}", path.display(), tree, source),
        )
    })
}

fn ragged(path: &Path, tree: &str, column: &str) -> ValidatorError {
    ValidatorError::schema(
        "SCHEMA.RAGGED_COLUMN",
        format!(
            "'{}' tree '{}' column '{}' does not match 'event_id'",
            path.display(),
            tree,
            column
        ),
    )
}

/// The primary particle of every event that has one.
pub fn read_primary_particles(path: impl AsRef<Path>) -> ValidatorResult<Vec<ParticleRecord>> {
    let path = path.as_ref();
    let columns: ParticleColumns = read_tree(path, PARTICLES_TREE)?;
    let events = columns.event_id.len();
    let lists: [(&str, usize); 8] = [
        ("particle_type", columns.particle_type.len()),
        ("vx", columns.vx.len()),
        ("vy", columns.vy.len()),
        ("vz", columns.vz.len()),
        ("px", columns.px.len()),
        ("py", columns.py.len()),
        ("pz", columns.pz.len()),
        ("number_of_hits", columns.number_of_hits.len()),
    ];
    if let Some((column, _)) = lists.iter().find(|(_, length)| *length != events) {
        return Err(ragged(path, PARTICLES_TREE, column));
    }

    let mut particles = Vec::with_capacity(events);
    for event in 0..events {
        let first = |values: &Vec<Vec<f64>>| values[event].first().copied();
        let (Some(particle_type), Some(number_of_hits)) = (
            columns.particle_type[event].first().copied(),
            columns.number_of_hits[event].first().copied(),
        ) else {
            continue;
        };
        let vertex = [&columns.vx, &columns.vy, &columns.vz, &columns.px, &columns.py, &columns.pz]
            .map(first);
        let [Some(vx), Some(vy), Some(vz), Some(px), Some(py), Some(pz)] = vertex else {
            return Err(ragged(path, PARTICLES_TREE, "vx"));
        };
        particles.push(ParticleRecord {
            event_id: columns.event_id[event],
            particle_type,
            vx,
            vy,
            vz,
            px,
            py,
            pz,
            number_of_hits,
        });
    }
    Ok(particles)
}

/// Hits left by `primary_barcode`, with the momentum advanced to its
/// post-step value. Local coordinates are left at zero for the caller.
pub fn read_primary_hits(
    path: impl AsRef<Path>,
    primary_barcode: u64,
) -> ValidatorResult<Vec<HitRecord>> {
    let path = path.as_ref();
    let columns: HitColumns = read_tree(path, HITS_TREE)?;
    let rows = columns.event_id.len();
    let lengths: [(&str, usize); 12] = [
        ("geometry_id", columns.geometry_id.len()),
        ("particle_id", columns.particle_id.len()),
        ("index", columns.index.len()),
        ("tx", columns.tx.len()),
        ("ty", columns.ty.len()),
        ("tz", columns.tz.len()),
        ("tpx", columns.tpx.len()),
        ("tpy", columns.tpy.len()),
        ("tpz", columns.tpz.len()),
        ("deltapx", columns.deltapx.len()),
        ("deltapy", columns.deltapy.len()),
        ("deltapz", columns.deltapz.len()),
    ];
    if let Some((column, _)) = lengths.iter().find(|(_, length)| *length != rows) {
        return Err(ragged(path, HITS_TREE, column));
    }

    Ok((0..rows)
        .filter(|row| columns.particle_id[*row] == primary_barcode)
        .map(|row| HitRecord {
            event_id: columns.event_id[row],
            geometry_id: columns.geometry_id[row],
            index: columns.index[row],
            tx: columns.tx[row],
            ty: columns.ty[row],
            tz: columns.tz[row],
            tpx: columns.tpx[row] + columns.deltapx[row],
            tpy: columns.tpy[row] + columns.deltapy[row],
            tpz: columns.tpz[row] + columns.deltapz[row],
            lx: 0.0,
            ly: 0.0,
            quantized: QuantizedColumns::default(),
        })
        .collect())
}
