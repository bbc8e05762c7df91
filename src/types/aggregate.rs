//! Result types of the aggregation engine.

use serde::Serialize;
use std::fmt;

/// The summary statistics the client can compute over a cached time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    /// Mean over every row.
    Global,
    /// Mean per `year`.
    Yearly,
    /// Mean per month, derived as `mohr / 100`.
    Monthly,
    /// Mean per hour, derived as `mohr % 100`.
    Hourly,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 4] = [
        AggregateKind::Global,
        AggregateKind::Yearly,
        AggregateKind::Monthly,
        AggregateKind::Hourly,
    ];
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Global => "global",
            AggregateKind::Yearly => "yearly",
            AggregateKind::Monthly => "monthly",
            AggregateKind::Hourly => "hourly",
        };
        write!(f, "{name}")
    }
}

/// One group of a grouped aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    /// The year, month or hour this group covers.
    pub key: i64,
    /// Mean of the value column over the group, rounded to 2 decimals. `None` when every
    /// value in the group is null.
    pub value: Option<f64>,
    /// Number of rows that fell into the group.
    pub rows: usize,
}

/// A computed aggregate, tagged by kind. Grouped variants are sorted ascending by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AggregateResult {
    Global(f64),
    Yearly(Vec<Bucket>),
    Monthly(Vec<Bucket>),
    Hourly(Vec<Bucket>),
}

impl AggregateResult {
    pub fn kind(&self) -> AggregateKind {
        match self {
            AggregateResult::Global(_) => AggregateKind::Global,
            AggregateResult::Yearly(_) => AggregateKind::Yearly,
            AggregateResult::Monthly(_) => AggregateKind::Monthly,
            AggregateResult::Hourly(_) => AggregateKind::Hourly,
        }
    }

    pub fn as_global(&self) -> Option<f64> {
        match self {
            AggregateResult::Global(value) => Some(*value),
            _ => None,
        }
    }

    /// The buckets of a grouped result; empty for [`AggregateResult::Global`].
    pub fn buckets(&self) -> &[Bucket] {
        match self {
            AggregateResult::Global(_) => &[],
            AggregateResult::Yearly(buckets)
            | AggregateResult::Monthly(buckets)
            | AggregateResult::Hourly(buckets) => buckets,
        }
    }
}

/// Rounds to the 2-decimal reporting precision shared by interpolation and aggregation.
/// Ties go to the even neighbour.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
