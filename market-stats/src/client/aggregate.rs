use tokio_util::sync::CancellationToken;

use super::{Endpoint, FetchError, HttpApiClient};
use crate::{adapter::Adapter, fields::AggregateResponse, fields::AggregateRow, query::FilterState};

/// `GET <path>?<filters>` returning the `{ data, meta }` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateEndpoint {
    pub path: String,
    pub filters: FilterState,
}

impl AggregateEndpoint {
    pub fn new(path: impl Into<String>, filters: FilterState) -> Self {
        Self {
            path: path.into(),
            filters,
        }
    }
}

impl Endpoint for AggregateEndpoint {
    type Response = AggregateResponse;

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query(&self) -> Option<String> {
        self.filters.to_query()
    }
}

/// Fetch one aggregate endpoint and pass the reply through the version gate.
pub async fn fetch_aggregates(
    client: &HttpApiClient,
    adapter: &Adapter,
    endpoint: &AggregateEndpoint,
    cancel: &CancellationToken,
) -> Result<Vec<AggregateRow>, FetchError> {
    let response = client.request_cancellable(endpoint, cancel).await?;
    Ok(adapter.accept(response)?)
}
