//! Derived series for charts.
//!
//! Every transform is a pure function of boundary rows and degrades to an
//! empty result on missing or malformed input.

mod breakdown;
mod distribution;
mod growth;
mod oscillator;
mod weighted_median;

pub use breakdown::{region_breakdown, sale_type_breakdown, RegionPoint, SaleTypeSeriesPoint};
pub use distribution::{find_bin_index, price_histogram, uniform_bins, HistogramBin, PriceBin};
pub use growth::{growth_comparison, period_over_period, ChangePoint, GrowthPoint};
pub use oscillator::{
    compression_spreads, compute_baseline, oscillator, BaselineCache, BaselineStats,
    OscillatorBaseline, OscillatorPoint, SpreadKind, SpreadPoint,
};
pub use weighted_median::{grouped_volume_weighted_median, volume_weighted_median, GroupMedian};
