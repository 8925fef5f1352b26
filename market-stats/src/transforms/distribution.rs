use serde::{Deserialize, Serialize};

use crate::fields::{AggregateRow, Field};

/// Half-open price range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBin {
    pub start: f64,
    pub end: f64,
}

/// Index of the bin holding `price`.
///
/// On a shared edge the lower bound of the next bin wins. Prices at or above
/// the end of the final bin land in the final bin. Prices below the first
/// bin, inside a gap between bins, or not finite yield `None`.
pub fn find_bin_index(bins: &[PriceBin], price: f64) -> Option<usize> {
    let first = bins.first()?;
    let last = bins.last()?;
    if !price.is_finite() || price < first.start {
        return None;
    }
    if price >= last.end {
        return Some(bins.len() - 1);
    }
    bins.iter()
        .position(|bin| bin.start <= price && price < bin.end)
}

/// `count` equal-width bins spanning `[min, max]`.
pub fn uniform_bins(min: f64, max: f64, count: usize) -> Vec<PriceBin> {
    if count == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return vec![];
    }
    let width = (max - min) / count as f64;
    (0..count)
        .map(|i| PriceBin {
            start: min + width * i as f64,
            end: if i + 1 == count {
                max
            } else {
                min + width * (i + 1) as f64
            },
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

/// Number of transactions per bin, judged by [`Field::Price`].
pub fn price_histogram(rows: &[AggregateRow], bins: &[PriceBin]) -> Vec<HistogramBin> {
    let mut histogram: Vec<_> = bins
        .iter()
        .map(|bin| HistogramBin {
            start: bin.start,
            end: bin.end,
            count: 0,
        })
        .collect();
    for row in rows {
        let index = row
            .f64_field(Field::Price)
            .and_then(|price| find_bin_index(bins, price));
        if let Some(index) = index {
            histogram[index].count += 1;
        }
    }
    histogram
}
