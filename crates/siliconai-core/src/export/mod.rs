//! Simulation shard → encoded hits artifact.

mod shards;

pub use shards::{ShardPaths, discover_shards};

use crate::codec::RecordCodec;
use crate::config::ValidatorConfig;
use crate::domain::{HitRecord, ParticleRecord, ValidatorError, ValidatorResult};
use crate::geometry::{CoordinateTransform, GeometryHandle};
use crate::scheduling::{ShardOutcome, ShardPool, ShardProcessor};
use crate::sequence::SequenceBuilder;
use crate::simulation::{read_primary_hits, read_primary_particles};
use crate::store::{Artifact, ArtifactHeader, HITS_TABLE, verify_export};
use crate::table::{EncodedTable, Metadata};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub task_id: usize,
    pub output: PathBuf,
    pub rows: usize,
    pub events: usize,
    pub dropped_events: usize,
    pub orphan_hits: usize,
    pub geometry_failures: usize,
    pub sequence_length: Option<usize>,
}

/// In-memory result of encoding one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedShard {
    pub hits: EncodedTable,
    pub metadata: Metadata,
    pub orphan_hits: usize,
    pub geometry_failures: usize,
    pub dropped_events: usize,
    pub sequence_length: Option<usize>,
}

pub struct Exporter {
    codec: RecordCodec,
    transform: CoordinateTransform,
    output_path: PathBuf,
    fixed_length: bool,
    primary_barcode: u64,
}

impl Exporter {
    pub fn new(config: &ValidatorConfig, geometry: GeometryHandle) -> Self {
        let codec = config.codec();
        Self {
            transform: CoordinateTransform::new(geometry)
                .with_vertex_short_circuit(codec.sentinels()),
            codec,
            output_path: config.output_path.clone(),
            fixed_length: config.fixed_length,
            primary_barcode: config.primary_barcode,
        }
    }

    pub fn with_fixed_length(mut self, fixed_length: bool) -> Self {
        self.fixed_length = fixed_length;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Encode already loaded primary particles and hits of one shard.
    pub fn encode(
        &self,
        particles: &[ParticleRecord],
        hits: &[HitRecord],
    ) -> ValidatorResult<EncodedShard> {
        let positions: Vec<(u64, [f64; 3])> = hits
            .iter()
            .map(|hit| (hit.geometry_id, [hit.tx, hit.ty, hit.tz]))
            .collect();
        let local = self.transform.global_to_local_bulk(&positions);

        let encoded_hits = hits
            .iter()
            .zip(&local.values)
            .map(|(hit, [lx, ly])| {
                // local positions are single precision in the exported datasets
                self.codec.encode_hit(HitRecord {
                    lx: f64::from(*lx as f32),
                    ly: f64::from(*ly as f32),
                    ..*hit
                })
            })
            .collect::<ValidatorResult<Vec<_>>>()?;

        let built = SequenceBuilder::new(&self.codec).build(particles, &encoded_hits)?;
        let mut table = EncodedTable::from_sequence(&built.rows);

        let mut dropped_events = 0;
        let mut sequence_length = None;
        if self.fixed_length {
            if let Some(outcome) = table.retain_fixed_length() {
                info!(
                    sequence_length = outcome.sequence_length,
                    remaining = outcome.kept_events,
                    dropped = outcome.dropped_events,
                    "using fixed-length sequences"
                );
                dropped_events = outcome.dropped_events;
                sequence_length = Some(outcome.sequence_length);
            }
        }

        let metadata = Metadata::compute(&table);
        Ok(EncodedShard {
            hits: table,
            metadata,
            orphan_hits: built.orphan_hits,
            geometry_failures: local.failures,
            dropped_events,
            sequence_length,
        })
    }

    pub fn export_shard(&self, task_id: usize) -> ValidatorResult<ExportSummary> {
        let paths = ShardPaths::new(&self.output_path, task_id);
        info!(task_id, particles = %paths.particles.display(), "loading particles data");
        let particles = read_primary_particles(&paths.particles)?;
        info!(task_id, hits = %paths.hits.display(), "loading hits data");
        let hits = read_primary_hits(&paths.hits, self.primary_barcode)?;

        let shard = self.encode(&particles, &hits)?;

        info!(task_id, output = %paths.output.display(), rows = shard.hits.len(), "exporting data");
        let header = ArtifactHeader::for_codec(&self.codec);
        let mut artifact = Artifact::new(header);
        artifact.insert_hits(HITS_TABLE, &shard.hits)?;
        artifact.insert_metadata(&shard.metadata)?;
        artifact.write_atomic(&paths.output)?;

        info!(task_id, "validating data");
        verify_export(&paths.output, &header, &shard.hits, &shard.metadata)?;

        Ok(ExportSummary {
            task_id,
            output: paths.output,
            rows: shard.hits.len(),
            events: shard.hits.event_count(),
            dropped_events: shard.dropped_events,
            orphan_hits: shard.orphan_hits,
            geometry_failures: shard.geometry_failures,
            sequence_length: shard.sequence_length,
        })
    }

    /// Export one shard when `task_id` is given, otherwise every discovered
    /// shard on `pool`.
    pub fn export_all(
        &self,
        pool: &ShardPool,
        task_id: Option<usize>,
    ) -> ValidatorResult<Vec<ShardOutcome<ExportSummary>>> {
        let shards = discover_shards(&self.output_path)?;
        if let Some(task_id) = task_id {
            if task_id == 0 || task_id > shards {
                return Err(ValidatorError::schema(
                    "INPUT.TASK_ID",
                    format!(
                        "task id {} is outside the {} shards found in '{}'",
                        task_id,
                        shards,
                        self.output_path.display()
                    ),
                ));
            }
            info!(task_id, "running single task");
            return Ok(vec![ShardOutcome {
                task_id,
                result: self.export_shard(task_id),
            }]);
        }

        info!(workers = pool.workers(), shards, "exporting shards");
        Ok(pool.run(self, 1..=shards))
    }
}

impl ShardProcessor for Exporter {
    type Output = ExportSummary;

    fn process(&self, task_id: usize) -> ValidatorResult<ExportSummary> {
        self.export_shard(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::Exporter;
    use crate::config::ValidatorConfig;
    use crate::domain::{HitRecord, ParticleRecord, QuantizedColumns};
    use crate::geometry::{PlanarSurfaceGeometry, SurfacePlacement};
    use std::sync::Arc;

    const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    fn exporter() -> Exporter {
        let mut geometry = PlanarSurfaceGeometry::default();
        for (offset, id) in [101u64, 102, 103].into_iter().enumerate() {
            let center = [0.0, 0.0, 100.0 * (offset as f64 + 1.0)];
            geometry
                .insert(id, SurfacePlacement::new(center, IDENTITY))
                .expect("unique surface");
        }
        Exporter::new(&ValidatorConfig::default(), Arc::new(geometry))
    }

    fn hit(index: i32, geometry_id: u64) -> HitRecord {
        HitRecord {
            event_id: 0,
            geometry_id,
            index,
            tx: 1.234 * f64::from(index + 1),
            ty: -0.5,
            tz: 100.0 * f64::from(index + 1),
            tpx: 1.0,
            tpy: 0.0,
            tpz: 5.0,
            lx: 0.0,
            ly: 0.0,
            quantized: QuantizedColumns::default(),
        }
    }

    fn particle(event_id: u32, number_of_hits: u32) -> ParticleRecord {
        ParticleRecord {
            event_id,
            particle_type: 13,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            px: 1.0,
            py: 0.0,
            pz: 5.0,
            number_of_hits,
        }
    }

    #[test]
    fn single_event_produces_vertex_framed_sequence() {
        let shard = exporter()
            .encode(&[particle(0, 3)], &[hit(0, 101), hit(1, 102), hit(2, 103)])
            .expect("shard encodes");

        let rows = shard.hits.rows();
        assert_eq!(rows.len(), 5);
        let layout: Vec<_> = rows.iter().map(|row| (row.index, row.geometry_id)).collect();
        assert_eq!(
            layout,
            vec![(0, 1_000_000), (1, 101), (2, 102), (3, 103), (4, 1_000_001)]
        );
        assert!(rows.iter().all(|row| row.event_id == 0));
        assert_eq!(rows[1].lxq, 1.23);
        assert_eq!(rows[2].lxq, 2.47);
        assert_eq!(rows[1].tpzq, 5.0);
        assert_eq!(shard.geometry_failures, 0);
        assert_eq!(shard.metadata.entries().len(), 5);
    }

    #[test]
    fn local_positions_are_quantized_in_single_precision() {
        let shard = exporter()
            .encode(
                &[particle(0, 1)],
                &[HitRecord {
                    tx: 0.025,
                    ty: 0.015,
                    tz: 100.0,
                    ..hit(0, 101)
                }],
            )
            .expect("shard encodes");

        // 0.025 and 0.015 land on the other side of the rounding tie as f32
        let row = shard.hits.rows()[1];
        assert_eq!(row.lxq, 0.03);
        assert_eq!(row.lyq, 0.01);
    }

    #[test]
    fn unknown_surfaces_are_counted_not_fatal() {
        let shard = exporter()
            .encode(&[particle(0, 2)], &[hit(0, 101), hit(1, 999)])
            .expect("shard encodes");

        assert_eq!(shard.geometry_failures, 1);
        let unknown = shard
            .hits
            .rows()
            .iter()
            .find(|row| row.geometry_id == 999)
            .expect("row is kept");
        assert!(unknown.lxq.is_nan());
    }

    #[test]
    fn fixed_length_drops_off_mode_events() {
        let hits: Vec<HitRecord> = [0u32, 1, 2]
            .into_iter()
            .flat_map(|event_id| {
                let count = if event_id == 1 { 1 } else { 2 };
                (0..count).map(move |index| HitRecord {
                    event_id,
                    ..hit(index, 101)
                })
            })
            .collect();
        let shard = exporter()
            .with_fixed_length(true)
            .encode(&[particle(0, 2), particle(1, 1), particle(2, 2)], &hits)
            .expect("shard encodes");

        assert_eq!(shard.sequence_length, Some(4));
        assert_eq!(shard.dropped_events, 1);
        assert_eq!(shard.hits.event_count(), 2);
        assert!(shard.hits.rows().iter().all(|row| row.event_id < 2));
    }
}
