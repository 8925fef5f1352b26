//! Market compression: premiums between adjacent market tiers and their
//! Z-score relative to a long historical baseline.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    fields::{AggregateRow, Field, Region},
    period::{self, Grain, Period},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpreadKind {
    /// CCR premium over RCR.
    CcrRcr,
    /// RCR premium over OCR.
    RcrOcr,
}

impl SpreadKind {
    pub const ALL: [SpreadKind; 2] = [SpreadKind::CcrRcr, SpreadKind::RcrOcr];

    /// (more expensive tier, cheaper tier)
    pub fn tiers(&self) -> (Region, Region) {
        match self {
            SpreadKind::CcrRcr => (Region::Ccr, Region::Rcr),
            SpreadKind::RcrOcr => (Region::Rcr, Region::Ocr),
        }
    }

    /// Used whenever the historical window cannot produce a usable baseline.
    pub fn default_baseline(&self) -> BaselineStats {
        match self {
            SpreadKind::CcrRcr => BaselineStats {
                mean: 400.0,
                std_dev: 200.0,
            },
            SpreadKind::RcrOcr => BaselineStats {
                mean: 250.0,
                std_dev: 100.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl BaselineStats {
    /// Mean and sample standard deviation. `None` for fewer than two values
    /// or zero variance.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if values.len() < 2 {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        Some(Self { mean, std_dev }).filter(Self::is_usable)
    }

    /// A finite mean and a finite, positive standard deviation.
    pub fn is_usable(&self) -> bool {
        self.mean.is_finite() && self.std_dev.is_finite() && self.std_dev > 0.0
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Spreads of one period, in price-per-area units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadPoint {
    pub period: Period,
    pub ccr_rcr: Option<f64>,
    pub rcr_ocr: Option<f64>,
}

impl SpreadPoint {
    pub fn spread(&self, kind: SpreadKind) -> Option<f64> {
        match kind {
            SpreadKind::CcrRcr => self.ccr_rcr,
            SpreadKind::RcrOcr => self.rcr_ocr,
        }
    }
}

/// Per-period spreads computed from the median price-per-area of each
/// region. The first valid median per (period, region) wins; a spread is
/// absent when either of its tiers is.
pub fn compression_spreads(
    rows: &[AggregateRow],
    expected_grain: Option<Grain>,
) -> Vec<SpreadPoint> {
    let mut medians: BTreeMap<Period, BTreeMap<Region, f64>> = BTreeMap::new();
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
        let Some(median) = row.f64_field(Field::MedianPsf).filter(|v| *v > 0.0) else {
            continue;
        };
        medians
            .entry(period)
            .or_default()
            .entry(region)
            .or_insert(median);
    }

    medians
        .into_iter()
        .map(|(period, by_region)| {
            let spread = |kind: SpreadKind| {
                let (upper, lower) = kind.tiers();
                Some(by_region.get(&upper)? - by_region.get(&lower)?)
            };
            SpreadPoint {
                period,
                ccr_rcr: spread(SpreadKind::CcrRcr),
                rcr_ocr: spread(SpreadKind::RcrOcr),
            }
        })
        .collect()
}

/// Normalization reference for both spreads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OscillatorBaseline {
    pub ccr_rcr: BaselineStats,
    pub rcr_ocr: BaselineStats,
}

impl OscillatorBaseline {
    /// Stats of one spread, or its default when the stored stats cannot
    /// normalize (zero or non-finite standard deviation).
    pub fn get(&self, kind: SpreadKind) -> BaselineStats {
        let stats = match kind {
            SpreadKind::CcrRcr => self.ccr_rcr,
            SpreadKind::RcrOcr => self.rcr_ocr,
        };
        if stats.is_usable() {
            stats
        } else {
            tracing::debug!(?kind, ?stats, "unusable baseline, using default");
            kind.default_baseline()
        }
    }
}

impl Default for OscillatorBaseline {
    fn default() -> Self {
        Self {
            ccr_rcr: SpreadKind::CcrRcr.default_baseline(),
            rcr_ocr: SpreadKind::RcrOcr.default_baseline(),
        }
    }
}

/// Baseline from an unfiltered historical window. Each spread falls back to
/// its default independently.
pub fn compute_baseline(
    historical: &[AggregateRow],
    expected_grain: Option<Grain>,
) -> OscillatorBaseline {
    let spreads = compression_spreads(historical, expected_grain);
    let stats = |kind: SpreadKind| {
        let values: Vec<f64> = spreads.iter().filter_map(|p| p.spread(kind)).collect();
        BaselineStats::from_values(&values).unwrap_or_else(|| {
            tracing::debug!(?kind, points = values.len(), "degenerate baseline, using default");
            kind.default_baseline()
        })
    };
    OscillatorBaseline {
        ccr_rcr: stats(SpreadKind::CcrRcr),
        rcr_ocr: stats(SpreadKind::RcrOcr),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OscillatorPoint {
    pub period: Period,
    pub ccr_rcr_spread: Option<f64>,
    pub rcr_ocr_spread: Option<f64>,
    pub ccr_rcr_z: Option<f64>,
    pub rcr_ocr_z: Option<f64>,
}

/// Spreads of the (filtered) `rows` normalized against `baseline`.
pub fn oscillator(
    rows: &[AggregateRow],
    expected_grain: Option<Grain>,
    baseline: &OscillatorBaseline,
) -> Vec<OscillatorPoint> {
    compression_spreads(rows, expected_grain)
        .into_iter()
        .map(|point| {
            let z = |kind| point.spread(kind).map(|v| baseline.get(kind).z_score(v));
            OscillatorPoint {
                period: point.period,
                ccr_rcr_spread: point.ccr_rcr,
                rcr_ocr_spread: point.rcr_ocr,
                ccr_rcr_z: z(SpreadKind::CcrRcr),
                rcr_ocr_z: z(SpreadKind::RcrOcr),
            }
        })
        .collect()
}

/// Holds the baseline of one scope (e.g. a sale type) and recomputes it only
/// when the scope changes.
#[derive(Debug, Clone, Default)]
pub struct BaselineCache<S> {
    entry: Option<(S, OscillatorBaseline)>,
}

impl<S: PartialEq> BaselineCache<S> {
    pub fn new() -> Self {
        Self { entry: None }
    }

    pub fn get_or_compute(
        &mut self,
        scope: S,
        compute: impl FnOnce() -> OscillatorBaseline,
    ) -> OscillatorBaseline {
        match &self.entry {
            Some((cached_scope, baseline)) if *cached_scope == scope => *baseline,
            _ => {
                let baseline = compute();
                self.entry = Some((scope, baseline));
                baseline
            }
        }
    }

    pub fn cached(&self, scope: &S) -> Option<OscillatorBaseline> {
        self.entry
            .as_ref()
            .filter(|(cached_scope, _)| cached_scope == scope)
            .map(|(_, baseline)| *baseline)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::tests::row_construction::{q, rows};

    fn tier_rows(period: &str, ccr: f64, rcr: f64, ocr: f64) -> Vec<Value> {
        vec![
            json!({"period": period, "region": "CCR", "medianPsf": ccr}),
            json!({"period": period, "region": "RCR", "medianPsf": rcr}),
            json!({"period": period, "region": "OCR", "medianPsf": ocr}),
        ]
    }

    fn history() -> Vec<AggregateRow> {
        rows([
            tier_rows("2023-Q1", 2600.0, 2200.0, 1900.0),
            tier_rows("2023-Q2", 2700.0, 2200.0, 1950.0),
            tier_rows("2023-Q3", 2800.0, 2200.0, 2000.0),
        ]
        .concat())
    }

    #[test]
    fn z_score_of_mean_is_zero() {
        let stats = BaselineStats {
            mean: 400.0,
            std_dev: 50.0,
        };
        assert_eq!(stats.z_score(400.0), 0.0);
        assert_eq!(stats.z_score(500.0), 2.0);
    }

    #[test]
    fn degenerate_baselines_fall_back_to_defaults() {
        assert_eq!(BaselineStats::from_values(&[]), None);
        assert_eq!(BaselineStats::from_values(&[300.0]), None);
        assert_eq!(BaselineStats::from_values(&[300.0, 300.0, 300.0]), None);

        let flat = rows([tier_rows("2023-Q1", 2600.0, 2200.0, 1900.0)].concat());
        let baseline = compute_baseline(&flat, Some(Grain::Quarter));
        assert_eq!(baseline, OscillatorBaseline::default());

        let z = oscillator(&flat, Some(Grain::Quarter), &baseline)[0];
        assert_eq!(z.ccr_rcr_z, Some(0.0));
        assert!(z.rcr_ocr_z.unwrap().is_finite());
    }

    #[test]
    fn hand_built_flat_baseline_never_yields_infinite_z() {
        let baseline = OscillatorBaseline {
            ccr_rcr: BaselineStats {
                mean: 400.0,
                std_dev: 0.0,
            },
            rcr_ocr: BaselineStats {
                mean: f64::NAN,
                std_dev: 100.0,
            },
        };
        assert_eq!(baseline.get(SpreadKind::CcrRcr), SpreadKind::CcrRcr.default_baseline());

        // ccr-rcr spread 600, rcr-ocr spread 250
        let input = rows(tier_rows("2024-Q1", 2800.0, 2200.0, 1950.0));
        let point = oscillator(&input, Some(Grain::Quarter), &baseline)[0];
        assert_eq!(point.ccr_rcr_z, Some(1.0));
        assert_eq!(point.rcr_ocr_z, Some(0.0));
    }

    #[test]
    fn spreads_use_adjacent_tiers() {
        let spreads = compression_spreads(&history(), Some(Grain::Quarter));
        assert_eq!(
            spreads[1],
            SpreadPoint {
                period: q(2023, 2),
                ccr_rcr: Some(500.0),
                rcr_ocr: Some(250.0),
            }
        );
    }

    #[test]
    fn missing_tier_leaves_spread_empty() {
        let input = rows(vec![
            json!({"period": "2024-Q1", "region": "CCR", "medianPsf": 2600}),
            json!({"period": "2024-Q1", "region": "RCR", "medianPsf": "2100"}),
            json!({"period": "2024-Q1", "region": "OCR", "medianPsf": null}),
        ]);
        let spreads = compression_spreads(&input, None);
        assert_eq!(spreads[0].ccr_rcr, Some(500.0));
        assert_eq!(spreads[0].rcr_ocr, None);
    }

    #[test]
    fn baseline_is_independent_of_filtered_window() {
        let baseline = compute_baseline(&history(), Some(Grain::Quarter));
        // ccr-rcr spreads are 400, 500, 600
        assert_eq!(baseline.ccr_rcr.mean, 500.0);
        assert_eq!(baseline.ccr_rcr.std_dev, 100.0);

        let filtered = rows(tier_rows("2024-Q1", 2800.0, 2200.0, 2000.0));
        let points = oscillator(&filtered, Some(Grain::Quarter), &baseline);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ccr_rcr_spread, Some(600.0));
        assert_eq!(points[0].ccr_rcr_z, Some(1.0));
    }

    #[test]
    fn cache_recomputes_only_on_scope_change() {
        let mut cache = BaselineCache::new();
        let mut computed = 0;
        let mut compute = || {
            computed += 1;
            OscillatorBaseline::default()
        };
        cache.get_or_compute("resale", &mut compute);
        cache.get_or_compute("resale", &mut compute);
        assert!(cache.cached(&"resale").is_some());
        cache.get_or_compute("new_sale", &mut compute);
        assert!(cache.cached(&"resale").is_none());
        cache.invalidate();
        cache.get_or_compute("new_sale", &mut compute);
        assert_eq!(computed, 3);
    }
}
