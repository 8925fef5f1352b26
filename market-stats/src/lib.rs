pub mod adapter;
pub mod client;
pub mod fields;
pub mod logging;
pub mod period;
pub mod query;
pub mod rollup;
pub mod settings;
pub mod transforms;

#[cfg(any(feature = "test-utils", test))]
pub mod tests;

pub use adapter::Adapter;
pub use client::{FetchError, HttpApiClient};
pub use fields::{AggregateResponse, AggregateRow, ContractError, ContractVersion, Field};
pub use period::{Grain, Period};
pub use query::{AbortableQuery, ChartQuery, FilterKey, FilterState, QueryState};
pub use settings::Settings;
