//! Request orchestration: debounced filter keys, stale-response protection,
//! abortable queries and visibility-deferred fetching.

mod chart_query;
mod coordinator;
mod debounce;
mod deferred;
mod filter_key;
mod stale_guard;

pub use chart_query::{ChartQuery, Transform};
pub use coordinator::{AbortableQuery, QueryOptions, QueryState};
pub use debounce::Debouncer;
pub use deferred::{visibility_channel, DeferredFetch, FetchPriority, ReadySignal, VisibilityHandle};
pub use filter_key::{FilterKey, FilterState};
pub use stale_guard::{ActiveRequest, RequestToken, StaleRequestGuard};
