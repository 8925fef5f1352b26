use serde_json::Value;

use super::{Grain, Period};
use crate::fields::{AggregateRow, Field};

/// Extract the period of a row.
///
/// The unified `period`/`periodGrain` pair is preferred. Otherwise the
/// legacy buckets are probed by presence: the `expected_grain` bucket
/// first when given, then `year`, `quarter` and `month` in that order.
/// A legacy numeric `quarter`/`month` is combined with the row's `year`.
/// When the `expected_grain` bucket is present but invalid, no other
/// bucket is tried.
///
/// `None` means the row carries no usable temporal field and must be
/// skipped by the caller.
pub fn parse(row: &AggregateRow, expected_grain: Option<Grain>) -> Option<Period> {
    let unified = row.field(Field::Period).and_then(|value| {
        let declared = row
            .str_field(Field::PeriodGrain)
            .and_then(|g| g.parse::<Grain>().ok());
        parse_value(value, declared.or(expected_grain))
    });
    unified.or_else(|| parse_legacy(row, expected_grain))
}

/// Interpret a single temporal value.
///
/// Strings use their lexical family (`YYYY`, `YYYY-Qn`, `YYYY-MM`).
/// Integers are years; an integer declared at a finer grain is ambiguous
/// and yields `None`.
pub fn parse_value(value: &Value, grain: Option<Grain>) -> Option<Period> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => match grain {
            None | Some(Grain::Year) => {
                let year = n.as_i64()?;
                i32::try_from(year).ok().map(Period::of_year)
            }
            Some(Grain::Quarter | Grain::Month) => None,
        },
        _ => None,
    }
}

fn parse_legacy(row: &AggregateRow, expected_grain: Option<Grain>) -> Option<Period> {
    if let Some(grain) = expected_grain {
        if row.field(legacy_field(grain)).is_some() {
            return legacy_bucket(row, grain);
        }
    }
    [Grain::Year, Grain::Quarter, Grain::Month]
        .into_iter()
        .find_map(|grain| legacy_bucket(row, grain))
}

fn legacy_field(grain: Grain) -> Field {
    match grain {
        Grain::Year => Field::Year,
        Grain::Quarter => Field::Quarter,
        Grain::Month => Field::Month,
    }
}

fn legacy_bucket(row: &AggregateRow, grain: Grain) -> Option<Period> {
    match row.field(legacy_field(grain))? {
        Value::Number(n) if grain != Grain::Year => {
            let year = legacy_year(row)?;
            let sub = u32::try_from(n.as_u64()?).ok()?;
            Period::new(grain, year, sub).ok()
        }
        value => parse_value(value, Some(grain)).filter(|p| p.grain() == grain),
    }
}

fn legacy_year(row: &AggregateRow) -> Option<i32> {
    match row.field(Field::Year)? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::tests::row_construction::{m, q, row, y};

    #[rstest]
    // unified
    #[case(json!({ "period": "2024-Q3", "periodGrain": "quarter" }), None, Some(q(2024, 3)))]
    #[case(json!({ "period": 2024, "periodGrain": "year" }), None, Some(y(2024)))]
    #[case(json!({ "period": "2024-07" }), Some(Grain::Month), Some(m(2024, 7)))]
    #[case(json!({ "period": "2024-07", "period_grain": "month" }), None, Some(m(2024, 7)))]
    // legacy single-field buckets
    #[case(json!({ "year": 2021 }), None, Some(y(2021)))]
    #[case(json!({ "quarter": "2021-Q2" }), None, Some(q(2021, 2)))]
    #[case(json!({ "month": "2021-11" }), None, Some(m(2021, 11)))]
    // legacy composite buckets
    #[case(json!({ "year": 2021, "quarter": 2 }), Some(Grain::Quarter), Some(q(2021, 2)))]
    #[case(json!({ "year": "2021", "month": 11 }), Some(Grain::Month), Some(m(2021, 11)))]
    #[case(json!({ "year": 2021, "quarter": 2 }), None, Some(y(2021)))]
    // unified wins over legacy
    #[case(json!({ "period": "2024-Q1", "year": 1999 }), None, Some(q(2024, 1)))]
    // no temporal field
    #[case(json!({ "count": 3 }), None, None)]
    #[case(json!({ "period": null }), Some(Grain::Quarter), None)]
    // invalid expected bucket does not fall back to the year
    #[case(json!({ "quarter": 7, "year": 2020 }), Some(Grain::Quarter), None)]
    #[case(json!({ "month": "13", "year": 2020 }), Some(Grain::Month), None)]
    #[case(json!({ "quarter": 7, "year": 2020 }), None, Some(y(2020)))]
    fn parses_every_shape(
        #[case] raw: serde_json::Value,
        #[case] expected_grain: Option<Grain>,
        #[case] expected: Option<Period>,
    ) {
        assert_eq!(parse(&row(raw), expected_grain), expected);
    }

    #[test]
    fn bare_number_at_finer_grain_is_ambiguous() {
        assert_eq!(parse_value(&json!(3), Some(Grain::Quarter)), None);
        assert_eq!(parse_value(&json!(2020), None), Some(y(2020)));
        assert_eq!(parse_value(&json!(true), None), None);
    }
}
