use super::histogram::PairedHistogram;
use crate::decode::DecodedHit;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Per-hit quantities compared between reference and generated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitColumn {
    Tr,
    Tx,
    Ty,
    Tz,
    Lx,
    Ly,
    Tpt,
    Tpx,
    Tpy,
    Tpz,
}

impl HitColumn {
    pub const ALL: [HitColumn; 10] = [
        Self::Tr,
        Self::Tx,
        Self::Ty,
        Self::Tz,
        Self::Lx,
        Self::Ly,
        Self::Tpt,
        Self::Tpx,
        Self::Tpy,
        Self::Tpz,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tr => "tr",
            Self::Tx => "tx",
            Self::Ty => "ty",
            Self::Tz => "tz",
            Self::Lx => "lx",
            Self::Ly => "ly",
            Self::Tpt => "tpt",
            Self::Tpx => "tpx",
            Self::Tpy => "tpy",
            Self::Tpz => "tpz",
        }
    }

    pub fn value(self, hit: &DecodedHit) -> f64 {
        match self {
            Self::Tr => hit.tr,
            Self::Tx => hit.tx,
            Self::Ty => hit.ty,
            Self::Tz => hit.tz,
            Self::Lx => hit.lx,
            Self::Ly => hit.ly,
            Self::Tpt => hit.tpt,
            Self::Tpx => hit.tpx,
            Self::Tpy => hit.tpy,
            Self::Tpz => hit.tpz,
        }
    }

    pub fn collect(self, hits: &[DecodedHit]) -> Vec<f64> {
        hits.iter().map(|hit| self.value(hit)).collect()
    }
}

impl Display for HitColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Hits per event on both sides. `difference` spans the union of events,
/// an event missing on one side counting as zero hits there.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HitCounts {
    pub reference: BTreeMap<u32, u64>,
    pub generated: BTreeMap<u32, u64>,
    pub difference: BTreeMap<u32, u64>,
}

impl HitCounts {
    pub fn count(reference: &[DecodedHit], generated: &[DecodedHit]) -> Self {
        let reference = per_event(reference);
        let generated = per_event(generated);
        let difference = reference
            .keys()
            .chain(generated.keys())
            .map(|event_id| {
                let lhs = reference.get(event_id).copied().unwrap_or(0);
                let rhs = generated.get(event_id).copied().unwrap_or(0);
                (*event_id, lhs.abs_diff(rhs))
            })
            .collect();
        Self {
            reference,
            generated,
            difference,
        }
    }
}

fn per_event(hits: &[DecodedHit]) -> BTreeMap<u32, u64> {
    let mut counts = BTreeMap::new();
    for hit in hits {
        *counts.entry(hit.event_id).or_insert(0) += 1;
    }
    counts
}

fn as_values(counts: &BTreeMap<u32, u64>) -> Vec<f64> {
    counts.values().map(|count| *count as f64).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub x: String,
    pub y: String,
    pub reference: Vec<[f64; 2]>,
    pub generated: Vec<[f64; 2]>,
}

impl ScatterSeries {
    pub fn new(
        x: HitColumn,
        y: HitColumn,
        reference: &[DecodedHit],
        generated: &[DecodedHit],
    ) -> Self {
        let points = |hits: &[DecodedHit]| {
            hits.iter()
                .map(|hit| [x.value(hit), y.value(hit)])
                .collect()
        };
        Self {
            x: x.to_string(),
            y: y.to_string(),
            reference: points(reference),
            generated: points(generated),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitComparison {
    pub events: usize,
    pub counts: HitCounts,
    pub histograms: Vec<PairedHistogram>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scatter: Vec<ScatterSeries>,
}

/// Compare decoded hits of both sides. `single_event` adds position scatter
/// series and drops the statistical errors.
pub fn compare_hits(
    reference: &[DecodedHit],
    generated: &[DecodedHit],
    single_event: bool,
) -> HitComparison {
    let errors = !single_event;
    let counts = HitCounts::count(reference, generated);

    let mut histograms = vec![
        PairedHistogram::paired(
            "nhits",
            &as_values(&counts.reference),
            &as_values(&counts.generated),
            errors,
            true,
        ),
        PairedHistogram::single("nhits_diff", &as_values(&counts.difference), errors),
    ];
    histograms.extend(HitColumn::ALL.into_iter().map(|column| {
        PairedHistogram::paired(
            column.as_str(),
            &column.collect(reference),
            &column.collect(generated),
            errors,
            true,
        )
    }));

    let scatter = if single_event {
        vec![
            ScatterSeries::new(HitColumn::Tx, HitColumn::Ty, reference, generated),
            ScatterSeries::new(HitColumn::Tz, HitColumn::Tr, reference, generated),
        ]
    } else {
        Vec::new()
    };

    HitComparison {
        events: counts.reference.len(),
        counts,
        histograms,
        scatter,
    }
}

#[cfg(test)]
mod tests {
    use super::{HitColumn, HitCounts, compare_hits};
    use crate::decode::DecodedHit;

    fn hit(event_id: u32, index: i32) -> DecodedHit {
        DecodedHit {
            event_id,
            index,
            geometry_id: 5,
            lx: 1.0,
            ly: 2.0,
            tx: 3.0,
            ty: 4.0,
            tz: 10.0,
            tr: 5.0,
            tpx: 1.0,
            tpy: 0.0,
            tpz: 2.0,
            tpt: 1.0,
            te: 2.3,
            deltapx: 0.0,
            deltapy: 0.0,
            deltapz: 0.0,
            deltapt: 0.0,
            deltae: 0.0,
        }
    }

    fn event(event_id: u32, hits: i32) -> Vec<DecodedHit> {
        (1..=hits).map(|index| hit(event_id, index)).collect()
    }

    #[test]
    fn hit_count_difference_is_zero_padded() {
        let reference = [event(0, 2), event(1, 3)].concat();
        let generated = [event(0, 2), event(2, 1)].concat();
        let counts = HitCounts::count(&reference, &generated);

        let difference: Vec<u64> = counts.difference.values().copied().collect();
        assert_eq!(difference, vec![0, 3, 1]);
        assert_eq!(counts.reference.len(), 2);
    }

    #[test]
    fn full_comparison_covers_every_hit_column() {
        let reference = [event(0, 2), event(1, 3)].concat();
        let comparison = compare_hits(&reference, &reference, false);

        assert_eq!(comparison.events, 2);
        assert_eq!(comparison.histograms.len(), 2 + HitColumn::ALL.len());
        assert!(comparison.scatter.is_empty());
        let tr = &comparison.histograms[2];
        assert_eq!(tr.variable, "tr");
        assert!(tr.reference.errors.is_some());
        assert!(tr.ratio.as_ref().expect("ratio").iter().all(|ratio| *ratio == 1.0));
        assert!(comparison.histograms[1].generated.is_none());
    }

    #[test]
    fn single_event_mode_adds_scatter_without_errors() {
        let reference = event(4, 2);
        let generated = event(4, 1);
        let comparison = compare_hits(&reference, &generated, true);

        assert_eq!(comparison.scatter.len(), 2);
        assert_eq!(comparison.scatter[0].reference, vec![[3.0, 4.0], [3.0, 4.0]]);
        assert_eq!(comparison.scatter[1].generated, vec![[10.0, 5.0]]);
        assert!(comparison.histograms.iter().all(|histogram| histogram.reference.errors.is_none()));
    }
}
