//! Shared Resource Lifecycle
//!
//! Owns one process-wide handle (e.g. a database pool): created lazily on the
//! first `acquire()`, reused by every later caller, and torn down exactly once
//! by `release()`.
//!
//! Callers hold a [`Lease`] while they use the handle. `release()` waits for
//! every outstanding lease to drop before closing the handle.

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedRwLockReadGuard, RwLock};
use tracing::{debug, error, info};

use crate::error::{QuoteSyncError, Result};

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No handle yet
    Unstarted,
    /// A single connection attempt is in flight
    Connecting,
    /// Handle available
    Ready,
    /// Waiting for leases to drain before closing
    Closing,
    /// Handle closed; acquire fails from now on
    Closed,
}

impl LifecycleState {
    /// Check if the handle can be handed out
    pub fn is_ready(&self) -> bool {
        matches!(self, LifecycleState::Ready)
    }

    /// Check if the lifecycle has begun or finished shutting down
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, LifecycleState::Closing | LifecycleState::Closed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unstarted => write!(f, "unstarted"),
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Closing => write!(f, "closing"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

/// Creates and closes the underlying handle
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Self::Handle>;

    async fn close(&self, handle: &Self::Handle);
}

/// Anything the shutdown routine must release
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn name(&self) -> &str;

    /// Idempotent; safe before first use and after a previous release
    async fn release(&self);
}

enum Slot<H> {
    Unstarted,
    /// Unstarted after a failed attempt; callers that queued behind that
    /// attempt receive its error instead of starting another one
    Failed(QuoteSyncError),
    Ready(Arc<H>),
    Closed,
}

/// Publishes `state` when dropped while still armed
///
/// Keeps the watch channel in step with the slot when an `acquire()` or
/// `release()` future is cancelled at an await point.
struct StateOnDrop<'a, C: Connector> {
    lifecycle: &'a ResourceLifecycle<C>,
    state: Option<LifecycleState>,
}

impl<'a, C: Connector> StateOnDrop<'a, C> {
    fn new(lifecycle: &'a ResourceLifecycle<C>, state: LifecycleState) -> Self {
        Self {
            lifecycle,
            state: Some(state),
        }
    }

    fn disarm(mut self) {
        self.state = None;
    }
}

impl<C: Connector> Drop for StateOnDrop<'_, C> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.lifecycle.set_state(state);
        }
    }
}

/// Lazily-connected, deterministically-released shared handle
pub struct ResourceLifecycle<C: Connector> {
    connector: C,
    slot: Mutex<Slot<C::Handle>>,
    /// Failed connection attempts so far
    failures: AtomicU64,
    /// Leases hold read guards; closing takes the write guard
    in_use: Arc<RwLock<()>>,
    state_tx: watch::Sender<LifecycleState>,
}

/// Non-owning use of the shared handle
///
/// The handle stays open at least until every lease is dropped.
pub struct Lease<H> {
    handle: Arc<H>,
    _guard: OwnedRwLockReadGuard<()>,
}

impl<H> Lease<H> {
    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }
}

impl<H> Deref for Lease<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<C: Connector> ResourceLifecycle<C> {
    pub fn new(connector: C) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Unstarted);
        Self {
            connector,
            slot: Mutex::new(Slot::Unstarted),
            failures: AtomicU64::new(0),
            in_use: Arc::new(RwLock::new(())),
            state_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LifecycleState) {
        let from = self.state_tx.send_replace(state);
        if from != state {
            info!(
                "Resource {} state: {} -> {}",
                self.connector.name(),
                from,
                state
            );
        }
    }

    fn closed_error(&self) -> QuoteSyncError {
        QuoteSyncError::LifecycleClosed {
            resource: self.connector.name().to_string(),
        }
    }

    /// Get the shared handle, connecting on first use
    ///
    /// Concurrent callers during a connection attempt all wait on that one
    /// attempt and share its result, success or failure. A failure leaves the
    /// lifecycle `Unstarted`, so a call made after it can try again. Dropping
    /// the future mid-connect also returns the lifecycle to `Unstarted`.
    pub async fn acquire(&self) -> Result<Lease<C::Handle>> {
        let failures_seen = self.failures.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        let handle = match &*slot {
            Slot::Ready(handle) => Arc::clone(handle),
            Slot::Closed => return Err(self.closed_error()),
            Slot::Failed(e) if self.failures.load(Ordering::SeqCst) != failures_seen => {
                debug!(
                    "Resource {} connection attempt failed while waiting",
                    self.connector.name()
                );
                return Err(e.duplicate());
            }
            Slot::Unstarted | Slot::Failed(_) => {
                self.set_state(LifecycleState::Connecting);
                let reset = StateOnDrop::new(self, LifecycleState::Unstarted);
                let connected = self.connector.connect().await;
                reset.disarm();

                match connected {
                    Ok(handle) => {
                        let handle = Arc::new(handle);
                        *slot = Slot::Ready(Arc::clone(&handle));
                        self.set_state(LifecycleState::Ready);
                        handle
                    }
                    Err(e) => {
                        error!("Resource {} failed to connect: {}", self.connector.name(), e);
                        *slot = Slot::Failed(e.duplicate());
                        self.failures.fetch_add(1, Ordering::SeqCst);
                        self.set_state(LifecycleState::Unstarted);
                        return Err(e);
                    }
                }
            }
        };

        // Writers only run under the slot lock, so this never waits.
        let guard = Arc::clone(&self.in_use).read_owned().await;
        drop(slot);

        Ok(Lease {
            handle,
            _guard: guard,
        })
    }

    /// Close the handle once every lease is returned
    ///
    /// Must not be awaited while the caller itself holds a lease. If the
    /// future is dropped while leases are still out, the lifecycle stays
    /// `Ready` and a later call can release it.
    pub async fn release(&self) {
        let mut slot = self.slot.lock().await;

        match &*slot {
            Slot::Closed => {
                debug!("Resource {} already released", self.connector.name());
            }
            Slot::Unstarted | Slot::Failed(_) => {
                *slot = Slot::Closed;
                self.set_state(LifecycleState::Closed);
            }
            Slot::Ready(handle) => {
                let handle = Arc::clone(handle);
                self.set_state(LifecycleState::Closing);

                let restore = StateOnDrop::new(self, LifecycleState::Ready);
                let exclusive = self.in_use.write().await;
                restore.disarm();

                // Past this point the handle is gone even if close is cut short.
                *slot = Slot::Closed;
                let _closed = StateOnDrop::new(self, LifecycleState::Closed);
                self.connector.close(&handle).await;
                drop(exclusive);
            }
        }
    }
}

#[async_trait]
impl<C: Connector> ManagedResource for ResourceLifecycle<C> {
    fn name(&self) -> &str {
        self.connector.name()
    }

    async fn release(&self) {
        ResourceLifecycle::release(self).await;
    }
}
