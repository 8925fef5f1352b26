use std::fmt;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Identifier of one logical fetch attempt. Strictly increasing per guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a started request: its token and its cancellation signal.
#[derive(Debug, Clone)]
pub struct ActiveRequest {
    token: RequestToken,
    cancel: CancellationToken,
}

impl ActiveRequest {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[derive(Debug, Default)]
struct GuardState {
    issued: u64,
    current: Option<ActiveRequest>,
}

/// Tags every logical request with a fresh token and answers whether a
/// token has been superseded.
///
/// Multi-step fetches must check staleness before *every* state commit,
/// since a newer request may start between two sub-fetches.
/// [`commit`](Self::commit) performs the check and the commit atomically.
#[derive(Debug, Default)]
pub struct StaleRequestGuard {
    state: Mutex<GuardState>,
}

impl StaleRequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede the current request (cancelling its signal) and start a
    /// new one.
    pub fn start_request(&self) -> ActiveRequest {
        let mut state = self.state.lock();
        if let Some(previous) = state.current.take() {
            previous.cancel.cancel();
        }
        state.issued += 1;
        let request = ActiveRequest {
            token: RequestToken(state.issued),
            cancel: CancellationToken::new(),
        };
        state.current = Some(request.clone());
        request
    }

    pub fn is_stale(&self, token: RequestToken) -> bool {
        self.state
            .lock()
            .current
            .as_ref()
            .map_or(true, |current| current.token != token)
    }

    pub fn current_token(&self) -> Option<RequestToken> {
        self.state.lock().current.as_ref().map(|c| c.token)
    }

    /// Cancellation signal of the current request, if any.
    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|c| c.cancel.clone())
    }

    /// Run `commit` only if `token` is still current. The guard stays locked
    /// while `commit` runs, so no request can start in between.
    pub fn commit<R>(&self, token: RequestToken, commit: impl FnOnce() -> R) -> Option<R> {
        let state = self.state.lock();
        match &state.current {
            Some(current) if current.token == token => Some(commit()),
            _ => None,
        }
    }

    /// Cancel the current request and make every issued token stale.
    pub fn cancel(&self) {
        if let Some(current) = self.state.lock().current.take() {
            current.cancel.cancel();
        }
    }
}

impl Drop for StaleRequestGuard {
    fn drop(&mut self) {
        if let Some(current) = self.state.get_mut().current.take() {
            current.cancel.cancel();
        }
    }
}
