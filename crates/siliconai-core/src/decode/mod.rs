//! Encoded table → physical hit quantities, shared by import and validation.

use crate::domain::{MUON_MASS_GEV, Sentinels};
use crate::geometry::CoordinateTransform;
use crate::table::EncodedTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumCorrection {
    /// Use the quantized momentum as stored.
    AsStored,
    /// Subtract the model's residual columns when the table carries them.
    SubtractResidual,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedHit {
    pub event_id: u32,
    pub index: i32,
    pub geometry_id: u64,
    pub lx: f64,
    pub ly: f64,
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub tr: f64,
    pub tpx: f64,
    pub tpy: f64,
    pub tpz: f64,
    pub tpt: f64,
    pub te: f64,
    pub deltapx: f64,
    pub deltapy: f64,
    pub deltapz: f64,
    pub deltapt: f64,
    pub deltae: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedTable {
    pub hits: Vec<DecodedHit>,
    pub dropped_sentinels: usize,
    pub geometry_failures: usize,
}

/// Drop vertex pseudo-hits and rebuild global positions and momenta of the
/// remaining rows. Rows on unknown surfaces keep NaN positions.
pub fn decode_table(
    table: &EncodedTable,
    sentinels: Sentinels,
    transform: &CoordinateTransform,
    correction: MomentumCorrection,
) -> DecodedTable {
    let rows: Vec<_> = table
        .rows()
        .iter()
        .filter(|row| !sentinels.is_sentinel(row.geometry_id))
        .collect();
    let dropped_sentinels = table.len() - rows.len();

    let local: Vec<(u64, [f64; 2])> = rows
        .iter()
        .map(|row| (row.geometry_id, [row.lxq, row.lyq]))
        .collect();
    let global = transform.local_to_global_bulk(&local);

    let hits = rows
        .iter()
        .zip(&global.values)
        .map(|(row, [x, y, z])| {
            let delta = row.residual.unwrap_or([0.0; 3]);
            let (tpx, tpy, tpz) = match correction {
                MomentumCorrection::SubtractResidual => {
                    (row.tpxq - delta[0], row.tpyq - delta[1], row.tpzq - delta[2])
                }
                MomentumCorrection::AsStored => (row.tpxq, row.tpyq, row.tpzq),
            };
            let tpt = tpx.hypot(tpy);
            // global positions are single precision in the engine schema
            let (tx, ty, tz) = (f64::from(*x as f32), f64::from(*y as f32), f64::from(*z as f32));

            DecodedHit {
                event_id: row.event_id,
                index: row.index,
                geometry_id: row.geometry_id,
                lx: row.lxq,
                ly: row.lyq,
                tx,
                ty,
                tz,
                tr: tx.hypot(ty),
                tpx,
                tpy,
                tpz,
                tpt,
                te: (tpx * tpx + tpy * tpy + tpz * tpz + MUON_MASS_GEV * MUON_MASS_GEV).sqrt(),
                deltapx: delta[0],
                deltapy: delta[1],
                deltapz: delta[2],
                deltapt: (tpx + delta[0]).hypot(tpy + delta[1]) - tpt,
                deltae: -(delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt(),
            }
        })
        .collect();

    DecodedTable {
        hits,
        dropped_sentinels,
        geometry_failures: global.failures,
    }
}
