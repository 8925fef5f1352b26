//! HTTP boundary: endpoints, the middleware-aware client and its errors.

mod aggregate;
mod config;
mod endpoint;
mod error;
mod http;

pub use aggregate::{fetch_aggregates, AggregateEndpoint};
pub use config::Config;
pub use endpoint::{serialize_query, Endpoint};
pub use error::FetchError;
pub use http::HttpApiClient;
