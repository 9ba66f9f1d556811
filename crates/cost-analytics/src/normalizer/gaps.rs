//! Gap handling for bucketed series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::series::{Granularity, SeriesPoint};

/// How missing buckets between the first and last observation are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Series with any gap are excluded
    #[default]
    Drop,
    /// Missing buckets become estimated zeros
    ZeroFill,
    /// Missing buckets repeat the previous value, marked estimated
    CarryForward,
}

/// Result of applying a gap policy to one series
#[derive(Debug, Clone, PartialEq)]
pub enum GapOutcome {
    /// Contiguous points, possibly with estimated fills
    Contiguous(Vec<SeriesPoint>),
    /// Gaps found under `Drop`
    Discontinuous {
        /// Observed points only, still in time order
        observed: Vec<SeriesPoint>,
        /// Number of missing buckets
        missing: usize,
    },
}

/// Walk buckets from first to last, filling or rejecting holes
pub fn apply_gap_policy(
    buckets: &BTreeMap<DateTime<Utc>, f64>,
    granularity: Granularity,
    policy: GapPolicy,
) -> GapOutcome {
    let (Some((&first, _)), Some((&last, _))) =
        (buckets.first_key_value(), buckets.last_key_value())
    else {
        return GapOutcome::Contiguous(Vec::new());
    };

    let mut points = Vec::with_capacity(buckets.len());
    let mut missing = 0usize;
    let mut previous: Option<f64> = None;
    let mut cursor = first;

    while cursor <= last {
        match buckets.get(&cursor) {
            Some(&value) => {
                points.push(SeriesPoint::observed(cursor, value));
                previous = Some(value);
            }
            None => {
                missing += 1;
                match policy {
                    GapPolicy::Drop => {}
                    GapPolicy::ZeroFill => points.push(SeriesPoint::estimated(cursor, 0.0)),
                    GapPolicy::CarryForward => {
                        points.push(SeriesPoint::estimated(cursor, previous.unwrap_or(0.0)))
                    }
                }
            }
        }
        cursor = granularity.next(cursor);
    }

    if policy == GapPolicy::Drop && missing > 0 {
        GapOutcome::Discontinuous {
            observed: points,
            missing,
        }
    } else {
        GapOutcome::Contiguous(points)
    }
}
