use serde_json::Value;

use crate::{fields::AggregateRow, period::Period};

pub fn row(value: Value) -> AggregateRow {
    serde_json::from_value(value).unwrap()
}

pub fn rows(values: Vec<Value>) -> Vec<AggregateRow> {
    values.into_iter().map(row).collect()
}

pub fn y(year: i32) -> Period {
    Period::of_year(year)
}

pub fn q(year: i32, quarter: u32) -> Period {
    Period::of_quarter(year, quarter).unwrap()
}

pub fn m(year: i32, month: u32) -> Period {
    Period::of_month(year, month).unwrap()
}
