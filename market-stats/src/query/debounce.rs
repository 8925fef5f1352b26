use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::watch, task::AbortHandle};

/// Collapses bursts of key changes into a single committed key.
///
/// The first key commits immediately. Every later change (re)starts a timer
/// of `delay`; only the key present when the timer fires is committed.
/// Pending timers die with the debouncer.
pub struct Debouncer<K> {
    delay: Duration,
    committed: Arc<watch::Sender<Option<K>>>,
    pending: Mutex<Option<AbortHandle>>,
}

impl<K> Debouncer<K>
where
    K: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        let (committed, _) = watch::channel(None);
        Self {
            delay,
            committed: Arc::new(committed),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Must be called from within a tokio runtime.
    pub fn set(&self, key: K) {
        let mut pending = self.pending.lock();
        if let Some(timer) = pending.take() {
            timer.abort();
        }
        if self.committed.borrow().is_none() {
            self.committed.send_replace(Some(key));
            return;
        }
        let committed = Arc::clone(&self.committed);
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            committed.send_if_modified(|current| {
                if current.as_ref() == Some(&key) {
                    false
                } else {
                    *current = Some(key);
                    true
                }
            });
        });
        *pending = Some(timer.abort_handle());
    }

    /// Latest committed key.
    pub fn committed(&self) -> Option<K> {
        self.committed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<K>> {
        self.committed.subscribe()
    }

    /// Drop a pending change without committing it.
    pub fn cancel(&self) {
        if let Some(timer) = self.pending.lock().take() {
            timer.abort();
        }
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.get_mut().take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DELAY: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn first_key_commits_immediately() {
        let debouncer = Debouncer::new(DELAY);
        assert_eq!(debouncer.committed(), None);
        debouncer.set("initial");
        assert_eq!(debouncer.committed(), Some("initial"));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_commits_only_last_key() {
        let debouncer = Debouncer::new(DELAY);
        debouncer.set(0);
        let mut rx = debouncer.subscribe();
        rx.mark_unchanged();

        for key in 1..=5 {
            debouncer.set(key);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // last change happened at t=40ms
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(debouncer.committed(), Some(0));
        assert!(!rx.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(5));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(debouncer.committed(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_committed_key_does_not_notify() {
        let debouncer = Debouncer::new(DELAY);
        debouncer.set("a");
        let mut rx = debouncer.subscribe();
        rx.mark_unchanged();

        debouncer.set("b");
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.set("a");
        tokio::time::sleep(DELAY * 2).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_clear_pending_change() {
        let debouncer = Debouncer::new(DELAY);
        debouncer.set(1);
        debouncer.set(2);
        debouncer.cancel();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(debouncer.committed(), Some(1));

        let mut rx = debouncer.subscribe();
        debouncer.set(3);
        drop(debouncer);
        tokio::time::sleep(DELAY * 2).await;
        // sender is gone and nothing new was committed
        assert_eq!(*rx.borrow_and_update(), Some(1));
    }
}
