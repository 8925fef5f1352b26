use std::{future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    deferred::DeferredFetch,
    stale_guard::{RequestToken, StaleRequestGuard},
};
use crate::{client::FetchError, settings::QuerySettings};

/// What consumers render: `{ data, loading, error }`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Keep showing the last committed data while a newer request is in
    /// flight instead of reverting to an empty state.
    pub keep_previous_data: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            keep_previous_data: true,
        }
    }
}

impl From<&QuerySettings> for QueryOptions {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            keep_previous_data: settings.keep_previous_data,
        }
    }
}

type Operation<T> =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Dependency tuple and the operation started for it. Held locked while a
/// request is started so that both always describe the current request.
struct Current<K, T> {
    deps: Option<K>,
    operation: Option<Operation<T>>,
}

struct Inner<K, T> {
    guard: StaleRequestGuard,
    current: Mutex<Current<K, T>>,
    state: watch::Sender<QueryState<T>>,
    options: QueryOptions,
}

/// Runs an async fetch+transform keyed by a dependency tuple.
///
/// A change of the tuple cancels the in-flight operation and starts a new
/// one. Only the most recently started operation may commit; results of
/// superseded operations are dropped whenever they finish, and their
/// cancellation is never reported as an error.
pub struct AbortableQuery<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> AbortableQuery<K, T>
where
    K: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(options: QueryOptions) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            inner: Arc::new(Inner {
                guard: StaleRequestGuard::new(),
                current: Mutex::new(Current {
                    deps: None,
                    operation: None,
                }),
                state,
                options,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn deps(&self) -> Option<K> {
        self.inner.current.lock().deps.clone()
    }

    /// Start `operation` if `deps` differ from the current dependency tuple.
    ///
    /// Returns the token of the started request, or `None` if `deps` are
    /// unchanged and nothing was started.
    pub fn run<F, Fut>(&self, deps: K, operation: F) -> Option<RequestToken>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let mut current = self.inner.current.lock();
        if current.deps.as_ref() == Some(&deps) {
            return None;
        }
        tracing::debug!(?deps, "dependencies changed");
        let operation: Operation<T> = Arc::new(move |cancel| operation(cancel).boxed());
        current.deps = Some(deps);
        current.operation = Some(operation.clone());
        Some(self.start(operation))
    }

    /// Like [`run`](Self::run), but the operation waits until `gate` allows
    /// fetching. The wait itself is cancelled when the request is superseded.
    pub fn run_deferred<F, Fut>(
        &self,
        gate: &DeferredFetch,
        deps: K,
        operation: F,
    ) -> Option<RequestToken>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let ready = gate.ready_signal();
        let operation = Arc::new(operation);
        self.run(deps, move |cancel: CancellationToken| {
            let ready = ready.clone();
            let operation = Arc::clone(&operation);
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    allowed = ready.wait() => {
                        if !allowed {
                            return Err(FetchError::Cancelled);
                        }
                    }
                }
                (*operation)(cancel).await
            }
        })
    }

    /// Re-run the last operation for the current dependencies under a fresh
    /// token, e.g. after a retryable failure.
    pub fn refetch(&self) -> Option<RequestToken> {
        let current = self.inner.current.lock();
        let operation = current.operation.clone()?;
        Some(self.start(operation))
    }

    /// Cancel the in-flight operation without starting a new one. The
    /// dependencies are forgotten, so the next [`run`](Self::run) starts a
    /// request even for the same tuple, and [`refetch`](Self::refetch) has
    /// nothing to repeat.
    pub fn cancel(&self) {
        let mut current = self.inner.current.lock();
        current.deps = None;
        current.operation = None;
        self.inner.guard.cancel();
        self.inner.state.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }

    /// Must be called with `current` locked.
    fn start(&self, operation: Operation<T>) -> RequestToken {
        let request = self.inner.guard.start_request();
        let token = request.token();
        let keep_previous_data = self.inner.options.keep_previous_data;
        self.inner.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            if !keep_previous_data {
                state.data = None;
            }
        });

        let inner = Arc::clone(&self.inner);
        let cancel = request.cancellation();
        let span = tracing::debug_span!("abortable_query", %token);
        tokio::spawn(
            async move {
                let result = operation(cancel).await;
                inner.settle(token, result);
            }
            .instrument(span),
        );
        token
    }
}

impl<K, T> Inner<K, T> {
    fn settle(&self, token: RequestToken, result: Result<T, FetchError>) {
        let committed = self.guard.commit(token, || {
            self.state.send_modify(|state| {
                state.loading = false;
                match result {
                    Ok(data) => {
                        state.data = Some(data);
                        state.error = None;
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "query failed");
                        state.error = Some(err);
                    }
                }
            })
        });
        if committed.is_none() {
            tracing::debug!("discarding result of superseded request");
        }
    }
}

impl<K, T> Drop for AbortableQuery<K, T> {
    fn drop(&mut self) {
        self.inner.guard.cancel();
    }
}
