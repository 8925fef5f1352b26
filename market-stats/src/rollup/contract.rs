use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use rust_decimal::Decimal;

use super::{rollup, rollup_rows, Dimensions, MetricRow};
use crate::{
    fields::{AggregateRow, Field},
    period::{Grain, Period},
};

/// One disagreement between a client rollup and the backend's own
/// aggregation at the same grain. `metric` is `None` when the whole group
/// exists on one side only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupMismatch {
    pub period: Period,
    pub dimensions: Dimensions,
    pub metric: Option<Field>,
    pub client: Option<Decimal>,
    pub server: Option<Decimal>,
}

impl fmt::Display for RollupMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dimensions = self
            .dimensions
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .join(",");
        let show = |v: Option<Decimal>| v.map_or("-".to_owned(), |v| v.to_string());
        write!(
            f,
            "{} [{dimensions}] {}: client {} vs server {}",
            self.period,
            self.metric.map_or("group".to_owned(), |m| m.to_string()),
            show(self.client),
            show(self.server),
        )
    }
}

fn index(rows: Vec<MetricRow>) -> BTreeMap<(Period, Dimensions), BTreeMap<Field, Decimal>> {
    rows.into_iter()
        .map(|row| ((row.period, row.dimensions), row.metrics))
        .collect()
}

/// Roll `monthly` up to `target` and compare every group and every additive
/// metric the server reports against `server`, which must hold the
/// backend's native aggregation at `target` over the same date range.
///
/// Metrics the server does not report are not compared.
pub fn verify_rollup_against_server(
    monthly: &[AggregateRow],
    server: &[AggregateRow],
    target: Grain,
    group_by: &[Field],
) -> Result<(), Vec<RollupMismatch>> {
    let client = index(rollup_rows(monthly, Some(Grain::Month), target, group_by));
    // the server may report several rows per group (e.g. split by a
    // dimension we do not group on); fold them first
    let server_rows: Vec<_> = server
        .iter()
        .filter_map(|row| MetricRow::from_row(row, Some(target), group_by))
        .collect();
    let server = index(rollup(&server_rows, target));

    let mut mismatches = vec![];
    for key in client.keys().chain(server.keys()).unique() {
        let (period, dimensions) = key;
        match (client.get(key), server.get(key)) {
            (Some(client_metrics), Some(server_metrics)) => {
                for (&field, &server_value) in server_metrics {
                    let client_value = client_metrics.get(&field).copied();
                    if client_value != Some(server_value) {
                        mismatches.push(RollupMismatch {
                            period: *period,
                            dimensions: dimensions.clone(),
                            metric: Some(field),
                            client: client_value,
                            server: Some(server_value),
                        });
                    }
                }
            }
            (client_metrics, server_metrics) => {
                let count = |m: Option<&BTreeMap<Field, Decimal>>| {
                    m.and_then(|m| m.get(&Field::Count).copied())
                };
                mismatches.push(RollupMismatch {
                    period: *period,
                    dimensions: dimensions.clone(),
                    metric: None,
                    client: count(client_metrics),
                    server: count(server_metrics),
                });
            }
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        for mismatch in &mismatches {
            tracing::warn!(%mismatch, "client rollup disagrees with server aggregation");
        }
        Err(mismatches)
    }
}
