use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    fields::{AggregateRow, Field},
    rollup::dimension_value,
};

/// Median weighted by economic magnitude: values are ordered ascending and
/// the first one at which the running sum reaches half of the total is
/// returned. Non-finite and non-positive values are ignored.
pub fn volume_weighted_median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values: Vec<f64> = values
        .into_iter()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let half = values.iter().sum::<f64>() / 2.0;
    let mut running = 0.0;
    for value in &values {
        running += value;
        if running >= half {
            return Some(*value);
        }
    }
    values.last().copied()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMedian {
    pub group: String,
    pub median: f64,
    pub transactions: usize,
}

/// [`volume_weighted_median`] of `value` per distinct `group_by` value,
/// ordered by group. Rows lacking the group or a usable value are skipped.
pub fn grouped_volume_weighted_median(
    rows: &[AggregateRow],
    group_by: Field,
    value: Field,
) -> Vec<GroupMedian> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let (Some(group), Some(v)) = (dimension_value(row, group_by), row.f64_field(value)) else {
            continue;
        };
        groups.entry(group).or_default().push(v);
    }
    groups
        .into_iter()
        .filter_map(|(group, values)| {
            let transactions = values.len();
            volume_weighted_median(values).map(|median| GroupMedian {
                group,
                median,
                transactions,
            })
        })
        .collect()
}
