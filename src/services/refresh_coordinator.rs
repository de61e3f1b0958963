use crate::error::ClientError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// What a waiter receives once the in-flight refresh settles.
pub type RefreshOutcome = Result<String, Arc<ClientError>>;

/// Serializes token refreshes for one client instance.
///
/// Requests that fail with an expired token are parked here as waiters. The
/// first waiter to arrive while no refresh is running receives a
/// [`RefreshGuard`], and whoever holds it performs the refresh and settles the
/// queue. The flag check and the enqueue happen under a single lock that is
/// never held across an await point, so at most one refresh is in flight.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of requests waiting on the current refresh.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Queues a waiter for the next refresh outcome.
    ///
    /// Returns a guard when no refresh was running; the caller must then start one.
    pub fn enqueue(self: &Arc<Self>) -> (oneshot::Receiver<RefreshOutcome>, Option<RefreshGuard>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        state.waiters.push(tx);

        if state.refreshing {
            return (rx, None);
        }
        state.refreshing = true;
        drop(state);

        let guard = RefreshGuard {
            coordinator: Arc::clone(self),
            settled: false,
        };
        (rx, Some(guard))
    }

    /// Queues a waiter only if a refresh is already running.
    pub fn park_if_refreshing(&self) -> Option<oneshot::Receiver<RefreshOutcome>> {
        let mut state = self.lock();
        if !state.refreshing {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        Some(rx)
    }

    /// Drains the queue in enqueue order and clears the flag.
    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away has nothing left to resolve.
            let _ = waiter.send(outcome.clone());
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of the single in-flight refresh.
///
/// Dropping it unsettled fails every waiter with `RefreshAborted` and clears
/// the flag, so a panicking or cancelled refresh cannot wedge the client.
#[derive(Debug)]
#[must_use = "dropping the guard aborts the refresh"]
pub struct RefreshGuard {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshGuard {
    /// Hands `token` to every waiter. Returns how many were released.
    pub fn succeed(mut self, token: String) -> usize {
        self.settled = true;
        self.coordinator.settle(&Ok(token))
    }

    /// Fails every waiter with the shared `error`. Returns how many were released.
    pub fn fail(mut self, error: Arc<ClientError>) -> usize {
        self.settled = true;
        self.coordinator.settle(&Err(error))
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            let released = self.coordinator.settle(&Err(Arc::new(ClientError::RefreshAborted)));
            tracing::warn!(waiters = released, "Token refresh abandoned before settling");
        }
    }
}
