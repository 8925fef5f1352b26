use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    fields::{AggregateRow, Field, Region, SaleType},
    period::{self, Grain, Period},
};

/// Transaction counts and values per sale type for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleTypeSeriesPoint {
    pub period: Period,
    pub new_sale_count: u64,
    pub resale_count: u64,
    pub sub_sale_count: u64,
    pub total_count: u64,
    pub new_sale_value: Decimal,
    pub resale_value: Decimal,
    pub sub_sale_value: Decimal,
    pub total_value: Decimal,
}

impl SaleTypeSeriesPoint {
    fn empty(period: Period) -> Self {
        Self {
            period,
            new_sale_count: 0,
            resale_count: 0,
            sub_sale_count: 0,
            total_count: 0,
            new_sale_value: Decimal::ZERO,
            resale_value: Decimal::ZERO,
            sub_sale_value: Decimal::ZERO,
            total_value: Decimal::ZERO,
        }
    }

    /// `None`, leaving the point untouched, when a sum would overflow.
    fn add(&mut self, sale_type: SaleType, count: u64, value: Decimal) -> Option<()> {
        let (bucket_count, bucket_value) = match sale_type {
            SaleType::NewSale => (&mut self.new_sale_count, &mut self.new_sale_value),
            SaleType::Resale => (&mut self.resale_count, &mut self.resale_value),
            SaleType::SubSale => (&mut self.sub_sale_count, &mut self.sub_sale_value),
        };
        let sums = (
            bucket_count.checked_add(count)?,
            bucket_value.checked_add(value)?,
            self.total_count.checked_add(count)?,
            self.total_value.checked_add(value)?,
        );
        (*bucket_count, *bucket_value, self.total_count, self.total_value) = sums;
        Some(())
    }
}

/// Transaction counts and values per market region for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPoint {
    pub period: Period,
    pub ccr_count: u64,
    pub rcr_count: u64,
    pub ocr_count: u64,
    pub total_count: u64,
    pub ccr_value: Decimal,
    pub rcr_value: Decimal,
    pub ocr_value: Decimal,
    pub total_value: Decimal,
}

impl RegionPoint {
    fn empty(period: Period) -> Self {
        Self {
            period,
            ccr_count: 0,
            rcr_count: 0,
            ocr_count: 0,
            total_count: 0,
            ccr_value: Decimal::ZERO,
            rcr_value: Decimal::ZERO,
            ocr_value: Decimal::ZERO,
            total_value: Decimal::ZERO,
        }
    }

    fn add(&mut self, region: Region, count: u64, value: Decimal) -> Option<()> {
        let (bucket_count, bucket_value) = match region {
            Region::Ccr => (&mut self.ccr_count, &mut self.ccr_value),
            Region::Rcr => (&mut self.rcr_count, &mut self.rcr_value),
            Region::Ocr => (&mut self.ocr_count, &mut self.ocr_value),
        };
        let sums = (
            bucket_count.checked_add(count)?,
            bucket_value.checked_add(value)?,
            self.total_count.checked_add(count)?,
            self.total_value.checked_add(value)?,
        );
        (*bucket_count, *bucket_value, self.total_count, self.total_value) = sums;
        Some(())
    }
}

fn additive_parts(row: &AggregateRow) -> (u64, Decimal) {
    (
        row.u64_field(Field::Count).unwrap_or(0),
        row.decimal_field(Field::TotalValue).unwrap_or_default(),
    )
}

/// One point per distinct period, in chronological order. Rows without a
/// period or with an unknown sale type are skipped.
pub fn sale_type_breakdown(
    rows: &[AggregateRow],
    expected_grain: Option<Grain>,
) -> Vec<SaleTypeSeriesPoint> {
    let mut points: BTreeMap<Period, SaleTypeSeriesPoint> = BTreeMap::new();
    for row in rows {
        let Some(period) = period::parse(row, expected_grain) else {
            tracing::debug!("skipping row without period");
            continue;
        };
        let Some(sale_type) = row
            .str_field(Field::SaleType)
            .and_then(|s| s.parse::<SaleType>().ok())
        else {
            tracing::debug!(%period, "skipping row without known sale type");
            continue;
        };
        let (count, value) = additive_parts(row);
        let added = points
            .entry(period)
            .or_insert_with(|| SaleTypeSeriesPoint::empty(period))
            .add(sale_type, count, value);
        if added.is_none() {
            tracing::debug!(%period, "skipping row that overflows period totals");
        }
    }
    points.into_values().collect()
}

/// Region counterpart of [`sale_type_breakdown`].
pub fn region_breakdown(rows: &[AggregateRow], expected_grain: Option<Grain>) -> Vec<RegionPoint> {
    let mut points: BTreeMap<Period, RegionPoint> = BTreeMap::new();
    for row in rows {
        let Some(period) = period::parse(row, expected_grain) else {
            continue;
        };
        let Some(region) = row
            .str_field(Field::Region)
            .and_then(|s| s.parse::<Region>().ok())
        else {
            continue;
        };
        let (count, value) = additive_parts(row);
        let added = points
            .entry(period)
            .or_insert_with(|| RegionPoint::empty(period))
            .add(region, count, value);
        if added.is_none() {
            tracing::debug!(%period, "skipping row that overflows period totals");
        }
    }
    points.into_values().collect()
}
