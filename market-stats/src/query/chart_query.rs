use std::sync::Arc;

use tokio::{sync::watch, task::AbortHandle};
use tokio_util::sync::CancellationToken;

use super::{
    coordinator::{AbortableQuery, QueryOptions, QueryState},
    debounce::Debouncer,
    deferred::DeferredFetch,
    filter_key::{FilterKey, FilterState},
};
use crate::{
    adapter::Adapter,
    client::{fetch_aggregates, AggregateEndpoint, HttpApiClient},
    fields::AggregateRow,
    settings::QuerySettings,
};

pub type Transform<T> = Arc<dyn Fn(&[AggregateRow]) -> T + Send + Sync>;

/// Shared pieces every request of one chart needs.
#[derive(Clone)]
struct ChartSource<T> {
    client: Arc<HttpApiClient>,
    adapter: Arc<Adapter>,
    path: Arc<str>,
    transform: Transform<T>,
}

/// One chart's data pipeline: filters are debounced, every committed filter
/// set supersedes the in-flight request, and the adapted rows are turned
/// into the chart's series by `transform`.
pub struct ChartQuery<T> {
    debouncer: Debouncer<FilterState>,
    query: Arc<AbortableQuery<FilterKey, T>>,
    driver: AbortHandle,
}

impl<T> ChartQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Must be called from within a tokio runtime.
    pub fn new<F>(
        client: Arc<HttpApiClient>,
        adapter: Arc<Adapter>,
        path: impl Into<String>,
        settings: &QuerySettings,
        deferred: Option<DeferredFetch>,
        transform: F,
    ) -> Self
    where
        F: Fn(&[AggregateRow]) -> T + Send + Sync + 'static,
    {
        let source = ChartSource {
            client,
            adapter,
            path: Arc::from(path.into()),
            transform: Arc::new(transform),
        };
        let debouncer = Debouncer::new(settings.debounce_delay);
        let query = Arc::new(AbortableQuery::new(QueryOptions::from(settings)));

        let mut committed = debouncer.subscribe();
        let driven = Arc::clone(&query);
        let driver = tokio::spawn(async move {
            loop {
                let filters = committed.borrow_and_update().clone();
                if let Some(filters) = filters {
                    source.launch(&driven, deferred.as_ref(), filters);
                }
                if committed.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            debouncer,
            query,
            driver: driver.abort_handle(),
        }
    }

    pub fn set_filters(&self, filters: FilterState) {
        self.debouncer.set(filters);
    }

    /// Filters of the last request that was allowed through the debouncer.
    pub fn committed_filters(&self) -> Option<FilterState> {
        self.debouncer.committed()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.query.subscribe()
    }

    pub fn state(&self) -> QueryState<T> {
        self.query.state()
    }

    pub fn refetch(&self) {
        self.query.refetch();
    }
}

impl<T> ChartSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn launch(
        &self,
        query: &AbortableQuery<FilterKey, T>,
        deferred: Option<&DeferredFetch>,
        filters: FilterState,
    ) {
        let key = filters.key();
        tracing::debug!(path = %self.path, %key, "chart filters committed");
        let endpoint = AggregateEndpoint::new(self.path.as_ref(), filters);
        let source = self.clone();
        let operation = move |cancel: CancellationToken| {
            let source = source.clone();
            let endpoint = endpoint.clone();
            async move {
                let rows =
                    fetch_aggregates(&source.client, &source.adapter, &endpoint, &cancel).await?;
                Ok((source.transform)(&rows))
            }
        };
        match deferred {
            Some(gate) => query.run_deferred(gate, key, operation),
            None => query.run(key, operation),
        };
    }
}

impl<T> Drop for ChartQuery<T> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
