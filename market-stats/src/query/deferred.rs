use std::time::Duration;

use serde::Deserialize;
use tokio::{sync::watch, task::AbortHandle};

use crate::settings::DeferredSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPriority {
    /// Fetch on mount, visible or not.
    High,
    Medium,
    Low,
}

impl FetchPriority {
    fn stagger(&self, settings: &DeferredSettings) -> Duration {
        match self {
            FetchPriority::High => Duration::ZERO,
            FetchPriority::Medium => settings.medium_stagger,
            FetchPriority::Low => settings.low_stagger,
        }
    }
}

/// Visibility feed of a consuming view.
///
/// The view layer must attach it to a node that renders unconditionally
/// (outside loading, empty and error branches); otherwise the view never
/// reports itself visible and its fetch never starts.
#[derive(Debug)]
pub struct VisibilityHandle(watch::Sender<bool>);

impl VisibilityHandle {
    pub fn set_visible(&self, visible: bool) {
        self.0.send_if_modified(|current| {
            let changed = *current != visible;
            *current = visible;
            changed
        });
    }
}

pub fn visibility_channel() -> (VisibilityHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (VisibilityHandle(tx), rx)
}

/// Latched "ready to fetch" flag.
#[derive(Debug, Clone)]
pub struct ReadySignal(watch::Receiver<bool>);

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves to `true` once fetching is allowed, or to `false` if the
    /// scheduler was dropped before that happened.
    pub async fn wait(mut self) -> bool {
        self.0.wait_for(|ready| *ready).await.is_ok()
    }
}

/// Delays a view's fetch until the view has entered the viewport, then
/// staggers it by priority.
pub struct DeferredFetch {
    priority: FetchPriority,
    should_fetch: watch::Receiver<bool>,
    // keeps the flag alive for high priority fetches, which need no task
    _ready_tx: Option<watch::Sender<bool>>,
    task: Option<AbortHandle>,
}

impl DeferredFetch {
    /// Must be called from within a tokio runtime unless `priority` is
    /// [`FetchPriority::High`].
    pub fn new(
        priority: FetchPriority,
        mut visibility: watch::Receiver<bool>,
        settings: &DeferredSettings,
    ) -> Self {
        if priority == FetchPriority::High {
            let (tx, rx) = watch::channel(true);
            return Self {
                priority,
                should_fetch: rx,
                _ready_tx: Some(tx),
                task: None,
            };
        }

        let (tx, rx) = watch::channel(false);
        let stagger = priority.stagger(settings);
        let task = tokio::spawn(async move {
            if visibility.wait_for(|visible| *visible).await.is_err() {
                // view went away without ever being shown
                return;
            }
            tokio::time::sleep(stagger).await;
            tracing::trace!(?priority, "deferred fetch released");
            tx.send_replace(true);
            // receivers must keep seeing `true`
            tx.closed().await;
        });
        Self {
            priority,
            should_fetch: rx,
            _ready_tx: None,
            task: Some(task.abort_handle()),
        }
    }

    pub fn priority(&self) -> FetchPriority {
        self.priority
    }

    pub fn should_fetch(&self) -> bool {
        *self.should_fetch.borrow()
    }

    pub fn ready_signal(&self) -> ReadySignal {
        ReadySignal(self.should_fetch.clone())
    }
}

impl Drop for DeferredFetch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
