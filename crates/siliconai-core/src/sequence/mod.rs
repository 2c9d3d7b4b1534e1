//! Per-event sequences: start vertex, detector hits, end vertex.

use crate::codec::RecordCodec;
use crate::domain::{
    HitRecord, ParticleRecord, SequenceRow, ValidatorError, ValidatorResult, VertexKind,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuiltSequence {
    pub rows: Vec<SequenceRow>,
    /// Hits whose event has no particle; they keep null particle columns.
    pub orphan_hits: usize,
    pub orphan_events: BTreeSet<u32>,
}

impl BuiltSequence {
    pub fn event_count(&self) -> usize {
        let mut events: Vec<u32> = self.rows.iter().map(|row| row.hit.event_id).collect();
        events.dedup();
        events.len()
    }
}

pub struct SequenceBuilder<'a> {
    codec: &'a RecordCodec,
}

impl<'a> SequenceBuilder<'a> {
    pub fn new(codec: &'a RecordCodec) -> Self {
        Self { codec }
    }

    /// Merge vertex pseudo-hits with encoded detector hits.
    ///
    /// `hits` carry the engine's zero-based index; it is shifted by one so
    /// the start vertex owns index 0.
    pub fn build(
        &self,
        particles: &[ParticleRecord],
        hits: &[HitRecord],
    ) -> ValidatorResult<BuiltSequence> {
        let start = self.codec.vertex_hits(particles, VertexKind::Start)?;
        let end = self.codec.vertex_hits(particles, VertexKind::End)?;

        let common: HashMap<u32, &ParticleRecord> = particles
            .iter()
            .map(|particle| (particle.event_id, particle))
            .collect();

        let mut rows = Vec::with_capacity(start.len() + hits.len() + end.len());
        let mut orphan_hits = 0usize;
        let mut orphan_events = BTreeSet::new();

        for hit in start.into_iter().chain(end) {
            rows.push(with_common(hit, common.get(&hit.event_id).copied()));
        }

        for hit in hits {
            let index = hit.index.checked_add(1).ok_or_else(|| {
                ValidatorError::index_structure(
                    "INDEX.HIT_OVERFLOW",
                    format!("event {} hit index {} overflows", hit.event_id, hit.index),
                )
            })?;
            let shifted = HitRecord { index, ..*hit };
            let particle = common.get(&hit.event_id).copied();
            if particle.is_none() {
                orphan_hits += 1;
                orphan_events.insert(hit.event_id);
            }
            rows.push(with_common(shifted, particle));
        }

        rows.sort_by_key(|row| row.hit.key());
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].hit.key() == pair[1].hit.key()) {
            let (event_id, index) = pair[0].hit.key();
            return Err(ValidatorError::index_structure(
                "INDEX.DUPLICATE_KEY",
                format!("duplicate sequence key (event {}, index {})", event_id, index),
            ));
        }

        if orphan_hits > 0 {
            warn!(
                orphan_hits,
                events = orphan_events.len(),
                "hits without a primary particle keep null particle columns"
            );
        }
        debug!(rows = rows.len(), particles = particles.len(), "sequence built");

        Ok(BuiltSequence {
            rows,
            orphan_hits,
            orphan_events,
        })
    }
}

fn with_common(hit: HitRecord, particle: Option<&ParticleRecord>) -> SequenceRow {
    SequenceRow {
        hit,
        particle_type: particle.map(|particle| particle.particle_type),
        number_of_hits: particle.map(|particle| particle.number_of_hits),
    }
}
