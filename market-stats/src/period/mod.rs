//! Time buckets independent of the contract version that produced them.

mod parse;

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::fields::AggregateRow;

pub use parse::{parse, parse_value};

/// Temporal resolution. Ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Month,
    Quarter,
    Year,
}

impl Grain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grain::Month => "month",
            Grain::Quarter => "quarter",
            Grain::Year => "year",
        }
    }

    fn months(&self) -> u32 {
        match self {
            Grain::Month => 1,
            Grain::Quarter => 3,
            Grain::Year => 12,
        }
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grain {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" | "monthly" => Ok(Grain::Month),
            "quarter" | "quarterly" => Ok(Grain::Quarter),
            "year" | "yearly" | "annual" => Ok(Grain::Year),
            _ => Err(ParsePeriodError::Grain(s.to_owned())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsePeriodError {
    #[error("unknown grain '{0}'")]
    Grain(String),
    #[error("'{0}' is not a year, YYYY-Qn or YYYY-MM")]
    Format(String),
    #[error("sub-period {sub} is out of range for {grain}")]
    OutOfRange { grain: Grain, sub: u32 },
}

/// A time bucket at some grain.
///
/// Invariant: `sub` is 1 for years, within `1..=4` for quarters and within
/// `1..=12` for months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    grain: Grain,
    year: i32,
    sub: u32,
}

impl Period {
    pub fn of_year(year: i32) -> Self {
        Self {
            grain: Grain::Year,
            year,
            sub: 1,
        }
    }

    pub fn of_quarter(year: i32, quarter: u32) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self {
            grain: Grain::Quarter,
            year,
            sub: quarter,
        })
    }

    pub fn of_month(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self {
            grain: Grain::Month,
            year,
            sub: month,
        })
    }

    pub fn new(grain: Grain, year: i32, sub: u32) -> Result<Self, ParsePeriodError> {
        let period = match grain {
            Grain::Year => Some(Self::of_year(year)),
            Grain::Quarter => Self::of_quarter(year, sub),
            Grain::Month => Self::of_month(year, sub),
        };
        period.ok_or(ParsePeriodError::OutOfRange { grain, sub })
    }

    pub fn grain(&self) -> Grain {
        self.grain
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Quarter or month number; always 1 for years.
    pub fn sub_period(&self) -> u32 {
        self.sub
    }

    fn first_month(&self) -> u32 {
        (self.sub - 1) * self.grain.months() + 1
    }

    /// Re-express the period at a coarser grain.
    ///
    /// Month `m` maps to quarter `ceil(m / 3)`; anything maps to its year.
    /// Converting to the same or a finer grain returns the period unchanged.
    pub fn convert(&self, target: Grain) -> Period {
        if self.grain >= target {
            return *self;
        }
        match target {
            Grain::Year => Self::of_year(self.year),
            Grain::Quarter => Self {
                grain: Grain::Quarter,
                year: self.year,
                sub: self.sub.div_ceil(3),
            },
            Grain::Month => *self,
        }
    }
}

impl Ord for Period {
    /// Chronological by bucket start; a coarser bucket sorts after a finer
    /// one starting at the same month.
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.first_month(), self.grain).cmp(&(
            other.year,
            other.first_month(),
            other.grain,
        ))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.grain {
            Grain::Year => write!(f, "{}", self.year),
            Grain::Quarter => write!(f, "{}-Q{}", self.year, self.sub),
            Grain::Month => write!(f, "{}-{:02}", self.year, self.sub),
        }
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    /// Accepts `YYYY`, `YYYY-Qn` and `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || ParsePeriodError::Format(s.to_owned());
        let trimmed = s.trim();
        let Some((year, rest)) = trimmed.split_once('-') else {
            let year = trimmed.parse().map_err(|_| format_err())?;
            return Ok(Period::of_year(year));
        };
        let year: i32 = year.parse().map_err(|_| format_err())?;
        if let Some(quarter) = rest.strip_prefix(['Q', 'q']) {
            let quarter = quarter.parse().map_err(|_| format_err())?;
            return Period::new(Grain::Quarter, year, quarter);
        }
        if rest.len() != 2 {
            return Err(format_err());
        }
        let month = rest.parse().map_err(|_| format_err())?;
        Period::new(Grain::Month, year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Total order over optional periods: a missing period is the earliest.
pub fn compare(a: Option<&Period>, b: Option<&Period>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Stable chronological sort that leaves the input untouched.
/// Rows without a temporal field come first.
pub fn sort_ascending(rows: &[AggregateRow], expected_grain: Option<Grain>) -> Vec<AggregateRow> {
    let mut keyed: Vec<_> = rows
        .iter()
        .map(|row| (parse(row, expected_grain), row))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare(a.as_ref(), b.as_ref()));
    keyed.into_iter().map(|(_, row)| row.clone()).collect()
}
