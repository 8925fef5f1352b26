//! Version-agnostic field lookup.
//!
//! Every logical field has one canonical key (the current contract) and a
//! fixed list of legacy keys used by older contracts. Lookup probes the
//! canonical key first and then the legacy keys in table order. Field
//! identity is never inferred from the shape of a value.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::row::AggregateRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    // temporal
    Period,
    PeriodGrain,
    Year,
    Quarter,
    Month,
    // dimensions
    SaleType,
    Region,
    District,
    Project,
    BedroomCount,
    // additive metrics
    Count,
    TotalValue,
    TotalArea,
    // statistical metrics
    MedianPsf,
    AvgPsf,
    Psf25th,
    Psf75th,
    MedianPrice,
    // per-transaction values
    Price,
    Psf,
}

impl Field {
    pub const ADDITIVE: [Field; 3] = [Field::Count, Field::TotalValue, Field::TotalArea];

    pub fn canonical_key(&self) -> &'static str {
        match self {
            Field::Period => "period",
            Field::PeriodGrain => "periodGrain",
            Field::Year => "year",
            Field::Quarter => "quarter",
            Field::Month => "month",
            Field::SaleType => "saleType",
            Field::Region => "region",
            Field::District => "district",
            Field::Project => "project",
            Field::BedroomCount => "bedroomCount",
            Field::Count => "count",
            Field::TotalValue => "totalValue",
            Field::TotalArea => "totalArea",
            Field::MedianPsf => "medianPsf",
            Field::AvgPsf => "avgPsf",
            Field::Psf25th => "psf25th",
            Field::Psf75th => "psf75th",
            Field::MedianPrice => "medianPrice",
            Field::Price => "price",
            Field::Psf => "psf",
        }
    }

    /// Keys used by older contracts, in probe order.
    pub fn legacy_keys(&self) -> &'static [&'static str] {
        match self {
            Field::Period => &["time_bucket"],
            Field::PeriodGrain => &["period_grain", "grain"],
            Field::Year | Field::Quarter | Field::Month => &[],
            Field::SaleType => &["sale_type", "type_of_sale"],
            Field::Region => &["market_segment", "marketSegment"],
            Field::District => &["postal_district"],
            Field::Project => &["project_name"],
            Field::BedroomCount => &["bedroom_count", "bedrooms"],
            Field::Count => &["txn_count", "transaction_count"],
            Field::TotalValue => &["total_value"],
            Field::TotalArea => &["total_area", "total_sqft"],
            Field::MedianPsf => &["median_psf"],
            Field::AvgPsf => &["avg_psf"],
            Field::Psf25th => &["psf_25th", "p25_psf"],
            Field::Psf75th => &["psf_75th", "p75_psf"],
            Field::MedianPrice => &["median_price"],
            Field::Price => &["transacted_price"],
            Field::Psf => &["unit_price_psf"],
        }
    }

    /// Additive metrics can be summed across periods; everything else has to
    /// be refetched at the wanted grain.
    pub fn is_additive(&self) -> bool {
        Self::ADDITIVE.contains(self)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_key())
    }
}

/// Resolve a logical field against a row of any contract version.
/// Returns `None` if neither the canonical nor any legacy key holds a value.
pub fn resolve(row: &AggregateRow, field: Field) -> Option<&Value> {
    std::iter::once(field.canonical_key())
        .chain(field.legacy_keys().iter().copied())
        .find_map(|key| row.raw(key))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownDimension {
    kind: &'static str,
    value: String,
}

fn normalize_label(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    NewSale,
    Resale,
    SubSale,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::NewSale => "new_sale",
            SaleType::Resale => "resale",
            SaleType::SubSale => "sub_sale",
        }
    }
}

impl FromStr for SaleType {
    type Err = UnknownDimension;

    /// Accepts canonical (`new_sale`) and legacy display labels (`New Sale`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "new_sale" | "newsale" | "new" => Ok(SaleType::NewSale),
            "resale" | "re_sale" => Ok(SaleType::Resale),
            "sub_sale" | "subsale" => Ok(SaleType::SubSale),
            _ => Err(UnknownDimension {
                kind: "sale type",
                value: s.to_owned(),
            }),
        }
    }
}

/// Market tiers, ordered from most to least expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    /// Core Central Region
    Ccr,
    /// Rest of Central Region
    Rcr,
    /// Outside Central Region
    Ocr,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Ccr => "CCR",
            Region::Rcr => "RCR",
            Region::Ocr => "OCR",
        }
    }
}

impl FromStr for Region {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "ccr" | "core_central_region" => Ok(Region::Ccr),
            "rcr" | "rest_of_central_region" => Ok(Region::Rcr),
            "ocr" | "outside_central_region" => Ok(Region::Ocr),
            _ => Err(UnknownDimension {
                kind: "region",
                value: s.to_owned(),
            }),
        }
    }
}
