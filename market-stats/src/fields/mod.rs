//! Raw boundary rows, field resolution across contract versions and the
//! contract version gate.

mod accessor;
mod row;
mod version;

pub use accessor::{resolve, Field, Region, SaleType, UnknownDimension};
pub use row::{AggregateResponse, AggregateRow, ResponseMeta};
pub use version::{ContractError, ContractVersion, ExecutionMode, VersionGate};
