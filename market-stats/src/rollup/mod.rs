//! Client-side re-aggregation of additive metrics from a finer to a coarser
//! grain (month -> quarter -> year).
//!
//! Sums are computed in [`Decimal`] so that the result equals a grouped
//! `SUM` computed by the backend over the same rows. Statistical metrics
//! (medians, percentiles) are never carried through a rollup.

mod contract;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::{
    fields::{AggregateRow, Field, Region, SaleType},
    period::{self, Grain, Period},
};

pub use contract::{verify_rollup_against_server, RollupMismatch};

pub type Dimensions = BTreeMap<Field, String>;

/// Additive view of one aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub period: Period,
    pub dimensions: Dimensions,
    pub metrics: BTreeMap<Field, Decimal>,
}

impl MetricRow {
    /// Rows without a period are skipped (`None`). Dimensions named in
    /// `group_by` that the row lacks are left out of its group key.
    pub fn from_row(
        row: &AggregateRow,
        expected_grain: Option<Grain>,
        group_by: &[Field],
    ) -> Option<Self> {
        let period = period::parse(row, expected_grain)?;
        let dimensions = group_by
            .iter()
            .filter_map(|&field| dimension_value(row, field).map(|v| (field, v)))
            .collect();
        let metrics = Field::ADDITIVE
            .iter()
            .filter_map(|&field| row.decimal_field(field).map(|v| (field, v)))
            .collect();
        Some(Self {
            period,
            dimensions,
            metrics,
        })
    }

    pub fn metric(&self, field: Field) -> Option<Decimal> {
        self.metrics.get(&field).copied()
    }

    pub fn count(&self) -> Decimal {
        self.metric(Field::Count).unwrap_or_default()
    }

    /// Average value per unit of area, derived from the summed numerator and
    /// denominator.
    pub fn average_psf(&self) -> Option<Decimal> {
        let value = self.metric(Field::TotalValue)?;
        let area = self.metric(Field::TotalArea)?;
        if area.is_zero() {
            return None;
        }
        value.checked_div(area)
    }
}

/// Canonical text of a dimension value, so that legacy labels such as
/// `"New Sale"` and canonical ones such as `"new_sale"` group together.
pub(crate) fn dimension_value(row: &AggregateRow, field: Field) -> Option<String> {
    let raw = match row.field(field)? {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    let canonical = match field {
        Field::SaleType => raw.parse::<SaleType>().ok().map(|s| s.as_str().to_owned()),
        Field::Region => raw.parse::<Region>().ok().map(|r| r.as_str().to_owned()),
        _ => None,
    };
    Some(canonical.unwrap_or(raw))
}

/// Re-aggregate `rows` at `target` grain.
///
/// At month grain the rows are returned in chronological order and
/// otherwise untouched. At coarser grains rows are grouped by
/// `(period converted to target, dimensions)` and every additive metric is
/// summed within the group. The output is sorted by period, then by
/// dimensions.
pub fn rollup(rows: &[MetricRow], target: Grain) -> Vec<MetricRow> {
    if target == Grain::Month {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| a.period.cmp(&b.period));
        return sorted;
    }

    let mut groups: BTreeMap<(Period, Dimensions), BTreeMap<Field, Decimal>> = BTreeMap::new();
    for row in rows {
        let key = (row.period.convert(target), row.dimensions.clone());
        let totals = groups.entry(key).or_default();
        let summed: Option<Vec<(Field, Decimal)>> = row
            .metrics
            .iter()
            .map(|(&field, &value)| {
                let total = totals.get(&field).copied().unwrap_or_default();
                Some((field, total.checked_add(value)?))
            })
            .collect();
        match summed {
            Some(summed) => totals.extend(summed),
            None => tracing::debug!(
                period = %row.period,
                "skipping row that overflows group totals"
            ),
        }
    }
    groups
        .into_iter()
        .map(|((period, dimensions), metrics)| MetricRow {
            period,
            dimensions,
            metrics,
        })
        .collect()
}

/// [`rollup`] straight from boundary rows. Rows without a period are
/// skipped.
pub fn rollup_rows(
    rows: &[AggregateRow],
    source_grain: Option<Grain>,
    target: Grain,
    group_by: &[Field],
) -> Vec<MetricRow> {
    let metric_rows: Vec<_> = rows
        .iter()
        .filter_map(|row| MetricRow::from_row(row, source_grain, group_by))
        .collect();
    let skipped = rows.len() - metric_rows.len();
    if skipped > 0 {
        tracing::debug!(skipped, "rows without a period left out of rollup");
    }
    rollup(&metric_rows, target)
}
