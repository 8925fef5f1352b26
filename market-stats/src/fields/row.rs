use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::accessor::{resolve, Field};

/// One aggregate row exactly as the boundary returned it.
///
/// The physical key names depend on the contract version that produced the
/// row, so consumers never index it directly; every typed getter goes
/// through [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateRow(Map<String, Value>);

impl AggregateRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Physical lookup; `null` is treated the same as a missing key.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn field(&self, field: Field) -> Option<&Value> {
        resolve(self, field)
    }

    pub fn str_field(&self, field: Field) -> Option<&str> {
        self.field(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numbers may arrive either as JSON numbers or as numeric strings
    /// (older contracts serialize decimals as text).
    pub fn f64_field(&self, field: Field) -> Option<f64> {
        let value = match self.field(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    pub fn u64_field(&self, field: Field) -> Option<u64> {
        match self.field(field)? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Exact decimal view of a numeric field, used wherever sums must match
    /// the backend to the last digit.
    pub fn decimal_field(&self, field: Field) -> Option<Decimal> {
        decimal_from_value(self.field(field)?)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for AggregateRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for AggregateRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Some(Decimal::from(u));
            }
            // textual form keeps the digits the backend sent
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}

/// `meta` block of a boundary reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(
        default,
        rename = "contractVersion",
        alias = "contract_version",
        alias = "apiContractVersion"
    )]
    pub contract_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{ data, meta }` envelope shared by every aggregate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    #[serde(default)]
    pub data: Vec<AggregateRow>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::tests::row_construction::row;

    #[test]
    fn numeric_getters_accept_numbers_and_numeric_strings() {
        let r = row(json!({
            "count": "350",
            "totalValue": 500000000,
            "medianPsf": "1850.5",
            "totalArea": "n/a",
        }));
        assert_eq!(r.u64_field(Field::Count), Some(350));
        assert_eq!(r.f64_field(Field::TotalValue), Some(500_000_000.0));
        assert_eq!(r.f64_field(Field::MedianPsf), Some(1850.5));
        assert_eq!(r.f64_field(Field::TotalArea), None);
        assert_eq!(r.decimal_field(Field::MedianPsf), Some(dec!(1850.5)));
    }

    #[test]
    fn null_is_absent() {
        let r = row(json!({ "saleType": null, "sale_type": "resale" }));
        assert_eq!(r.str_field(Field::SaleType), Some("resale"));
    }

    #[test]
    fn response_meta_accepts_version_aliases() {
        let response: AggregateResponse = serde_json::from_value(json!({
            "data": [{ "period": "2024-Q3" }],
            "meta": { "contract_version": "v2", "elapsedMs": 12 },
        }))
        .unwrap();
        assert_eq!(response.meta.contract_version.as_deref(), Some("v2"));
        assert_eq!(response.meta.extra.get("elapsedMs"), Some(&json!(12)));
        assert_eq!(response.data.len(), 1);
    }
}
