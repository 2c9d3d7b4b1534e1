//! The encoded hits table, its metadata and the fixed-length filter.

pub mod columns;

pub use columns::{HitColumns, MetadataColumns};

use crate::domain::{FloatColumn, SequenceRow, ValidatorError, ValidatorResult};
use crate::numerics::{ColumnSummary, summarize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedRow {
    pub event_id: u32,
    pub index: i32,
    pub geometry_id: u64,
    pub particle_type: Option<i32>,
    pub lxq: f64,
    pub lyq: f64,
    pub tpxq: f64,
    pub tpyq: f64,
    pub tpzq: f64,
    /// `deltapxq, deltapyq, deltapzq` of the model-residual variant.
    pub residual: Option<[f64; 3]>,
}

impl EncodedRow {
    pub fn from_sequence(row: &SequenceRow) -> Self {
        let quantized = row.hit.quantized;
        Self {
            event_id: row.hit.event_id,
            index: row.hit.index,
            geometry_id: row.hit.geometry_id,
            particle_type: row.particle_type,
            lxq: quantized.lxq,
            lyq: quantized.lyq,
            tpxq: quantized.tpxq,
            tpyq: quantized.tpyq,
            tpzq: quantized.tpzq,
            residual: None,
        }
    }

    pub fn key(&self) -> (u32, i32) {
        (self.event_id, self.index)
    }

    pub fn value(&self, column: FloatColumn) -> f64 {
        let residual = |axis: usize| self.residual.map_or(f64::NAN, |delta| delta[axis]);
        match column {
            FloatColumn::Lxq => self.lxq,
            FloatColumn::Lyq => self.lyq,
            FloatColumn::Tpxq => self.tpxq,
            FloatColumn::Tpyq => self.tpyq,
            FloatColumn::Tpzq => self.tpzq,
            FloatColumn::Deltapxq => residual(0),
            FloatColumn::Deltapyq => residual(1),
            FloatColumn::Deltapzq => residual(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodedTable {
    rows: Vec<EncodedRow>,
}

impl EncodedTable {
    pub fn new(mut rows: Vec<EncodedRow>) -> Self {
        rows.sort_by_key(EncodedRow::key);
        Self { rows }
    }

    pub fn from_sequence(rows: &[SequenceRow]) -> Self {
        Self::new(rows.iter().map(EncodedRow::from_sequence).collect())
    }

    pub fn rows(&self) -> &[EncodedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_residual(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|row| row.residual.is_some())
    }

    pub fn float_columns(&self) -> Vec<FloatColumn> {
        let mut columns = FloatColumn::QUANTIZED.to_vec();
        if self.has_residual() {
            columns.extend(FloatColumn::RESIDUAL);
        }
        columns
    }

    pub fn column(&self, column: FloatColumn) -> Vec<f64> {
        self.rows.iter().map(|row| row.value(column)).collect()
    }

    /// Row count per event, in event order.
    pub fn rows_per_event(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.event_id).or_insert(0) += 1;
        }
        counts
    }

    pub fn event_count(&self) -> usize {
        self.rows_per_event().len()
    }

    /// Keep only events whose sequence has the most common length (the
    /// shortest such length on ties) and renumber the survivors `0..M-1`
    /// in their original order.
    pub fn retain_fixed_length(&mut self) -> Option<FixedLengthOutcome> {
        let per_event = self.rows_per_event();
        let mut frequency: BTreeMap<usize, usize> = BTreeMap::new();
        for length in per_event.values() {
            *frequency.entry(*length).or_insert(0) += 1;
        }
        let best = frequency.values().copied().max()?;
        let sequence_length = frequency
            .iter()
            .find(|(_, count)| **count == best)
            .map(|(length, _)| *length)?;

        let renumbered: HashMap<u32, u32> = per_event
            .iter()
            .filter(|(_, length)| **length == sequence_length)
            .map(|(event_id, _)| *event_id)
            .zip(0u32..)
            .collect();

        self.rows.retain(|row| renumbered.contains_key(&row.event_id));
        for row in &mut self.rows {
            if let Some(event_id) = renumbered.get(&row.event_id) {
                row.event_id = *event_id;
            }
        }

        Some(FixedLengthOutcome {
            sequence_length,
            kept_events: renumbered.len(),
            dropped_events: per_event.len() - renumbered.len(),
        })
    }

    pub fn to_columns(&self) -> HitColumns {
        let mut columns = HitColumns::default();
        let residual = self.has_residual();
        for row in &self.rows {
            columns.event_id.push(row.event_id);
            columns.index.push(row.index);
            columns.geometry_id.push(row.geometry_id);
            columns.particle_type.push(row.particle_type);
            columns.lxq.push(row.lxq);
            columns.lyq.push(row.lyq);
            columns.tpxq.push(row.tpxq);
            columns.tpyq.push(row.tpyq);
            columns.tpzq.push(row.tpzq);
            if residual {
                columns.deltapxq.push(row.value(FloatColumn::Deltapxq));
                columns.deltapyq.push(row.value(FloatColumn::Deltapyq));
                columns.deltapzq.push(row.value(FloatColumn::Deltapzq));
            }
        }
        columns
    }

    pub fn from_columns(table: &str, columns: HitColumns) -> ValidatorResult<Self> {
        if let Some(column) = columns.ragged_column() {
            return Err(ValidatorError::schema(
                "SCHEMA.RAGGED_COLUMN",
                format!(
                    "table '{}' column '{}' does not have {} rows",
                    table,
                    column,
                    columns.event_id.len()
                ),
            ));
        }

        let residual = columns.has_residual();
        let rows = (0..columns.event_id.len())
            .map(|row| EncodedRow {
                event_id: columns.event_id[row],
                index: columns.index[row],
                geometry_id: columns.geometry_id[row],
                particle_type: columns.particle_type[row],
                lxq: columns.lxq[row],
                lyq: columns.lyq[row],
                tpxq: columns.tpxq[row],
                tpyq: columns.tpyq[row],
                tpzq: columns.tpzq[row],
                residual: residual.then(|| {
                    [
                        columns.deltapxq[row],
                        columns.deltapyq[row],
                        columns.deltapzq[row],
                    ]
                }),
            })
            .collect::<Vec<_>>();

        let table_rows = Self::new(rows);
        if let Some(pair) = table_rows
            .rows
            .windows(2)
            .find(|pair| pair[0].key() == pair[1].key())
        {
            let (event_id, index) = pair[0].key();
            return Err(ValidatorError::index_structure(
                "INDEX.DUPLICATE_KEY",
                format!(
                    "table '{}' repeats key (event {}, index {})",
                    table, event_id, index
                ),
            ));
        }
        Ok(table_rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLengthOutcome {
    pub sequence_length: usize,
    pub kept_events: usize,
    pub dropped_events: usize,
}

/// Summary statistics of every floating column of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    entries: Vec<(FloatColumn, ColumnSummary)>,
}

impl Metadata {
    pub fn compute(table: &EncodedTable) -> Self {
        let entries = table
            .float_columns()
            .into_iter()
            .map(|column| (column, summarize(&table.column(column))))
            .collect();
        Self { entries }
    }

    pub fn get(&self, column: FloatColumn) -> Option<&ColumnSummary> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == column)
            .map(|(_, summary)| summary)
    }

    pub fn entries(&self) -> &[(FloatColumn, ColumnSummary)] {
        &self.entries
    }

    pub fn to_columns(&self) -> MetadataColumns {
        let mut columns = MetadataColumns::default();
        for (column, summary) in &self.entries {
            columns.column.push(column.as_str().to_string());
            columns.min.push(summary.min);
            columns.max.push(summary.max);
            columns.mean.push(summary.mean);
            columns.std.push(summary.std);
        }
        columns
    }

    pub fn from_columns(columns: MetadataColumns) -> ValidatorResult<Self> {
        let rows = columns.column.len();
        if [
            columns.min.len(),
            columns.max.len(),
            columns.mean.len(),
            columns.std.len(),
        ]
        .iter()
        .any(|length| *length != rows)
        {
            return Err(ValidatorError::schema(
                "SCHEMA.RAGGED_COLUMN",
                format!("table 'metadata' columns do not all have {} rows", rows),
            ));
        }

        let mut entries = Vec::with_capacity(rows);
        for (row, name) in columns.column.iter().enumerate() {
            let column = FloatColumn::from_name(name).ok_or_else(|| {
                ValidatorError::schema(
                    "SCHEMA.METADATA_COLUMN",
                    format!("metadata describes unknown column '{}'", name),
                )
            })?;
            entries.push((
                column,
                ColumnSummary {
                    min: columns.min[row],
                    max: columns.max[row],
                    mean: columns.mean[row],
                    std: columns.std[row],
                },
            ));
        }
        Ok(Self { entries })
    }
}
