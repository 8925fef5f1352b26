use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    fields::{AggregateRow, Field},
    period::{self, Grain, Period},
    rollup::dimension_value,
};

/// One dumbbell: a group's value at the start and at the end of the shared
/// comparison window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub group: String,
    pub start_period: Period,
    pub end_period: Period,
    pub start_value: f64,
    pub end_value: f64,
    pub growth_pct: f64,
}

/// Compare every group between the earliest and the latest period found in
/// the whole of `rows`, so all groups share one window.
///
/// A group without a valid non-zero `metric` at either end is excluded.
/// The first valid value per (group, period) is used. Groups are returned
/// in key order.
pub fn growth_comparison(
    rows: &[AggregateRow],
    expected_grain: Option<Grain>,
    group_by: Field,
    metric: Field,
) -> Vec<GrowthPoint> {
    let parsed: Vec<_> = rows
        .iter()
        .filter_map(|row| period::parse(row, expected_grain).map(|p| (p, row)))
        .collect();
    let (Some(start), Some(end)) = (
        parsed.iter().map(|(p, _)| *p).min(),
        parsed.iter().map(|(p, _)| *p).max(),
    ) else {
        return vec![];
    };
    if start == end {
        return vec![];
    }

    let mut endpoints: BTreeMap<String, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for (period, row) in &parsed {
        if *period != start && *period != end {
            continue;
        }
        let Some(group) = dimension_value(row, group_by) else {
            continue;
        };
        let slot = endpoints.entry(group).or_default();
        let target = if *period == start {
            &mut slot.0
        } else {
            &mut slot.1
        };
        if target.is_none() {
            *target = row.f64_field(metric).filter(|v| *v != 0.0);
        }
    }

    endpoints
        .into_iter()
        .filter_map(|(group, values)| {
            let (Some(start_value), Some(end_value)) = values else {
                tracing::debug!(%group, "group lacks a value at a window endpoint");
                return None;
            };
            Some(GrowthPoint {
                group,
                start_period: start,
                end_period: end,
                start_value,
                end_value,
                growth_pct: (end_value - start_value) / start_value * 100.0,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePoint {
    pub period: Period,
    pub value: Option<f64>,
    pub change_pct: Option<f64>,
}

/// Percent change of each point relative to the previous one (in
/// chronological order). The first point, and any point whose predecessor
/// is absent or zero, has no change.
pub fn period_over_period(series: &[(Period, Option<f64>)]) -> Vec<ChangePoint> {
    let mut sorted = series.to_vec();
    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut previous: Option<f64> = None;
    sorted
        .into_iter()
        .map(|(period, value)| {
            let value = value.filter(|v| v.is_finite());
            let change_pct = match (previous, value) {
                (Some(prev), Some(current)) if prev != 0.0 => {
                    Some((current - prev) / prev * 100.0)
                }
                _ => None,
            };
            previous = value;
            ChangePoint {
                period,
                value,
                change_pct,
            }
        })
        .collect()
}
