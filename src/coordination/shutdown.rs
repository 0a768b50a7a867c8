//! Graceful Shutdown Handler
//!
//! Process-level termination routine: OS signals are translated into a
//! broadcast `ShutdownSignal`, and `execute()` releases every registered
//! shared resource exactly once, in reverse registration order.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use super::lifecycle::ManagedResource;

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Normal graceful shutdown (SIGTERM, SIGINT)
    Graceful,
    /// Urgent shutdown (SIGQUIT)
    Urgent,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Urgent => write!(f, "urgent"),
        }
    }
}

/// Shutdown phase tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Not shutting down
    Running,
    /// Waiting for in-flight invocations to finish
    Draining,
    /// Releasing shared resources
    Releasing,
    /// Shutdown complete
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Draining => write!(f, "draining"),
            ShutdownPhase::Releasing => write!(f, "releasing"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Graceful shutdown coordinator
pub struct GracefulShutdown {
    shutdown_requested: AtomicBool,
    executed: AtomicBool,
    phase: watch::Sender<ShutdownPhase>,
    signal_tx: broadcast::Sender<ShutdownSignal>,
    resources: Mutex<Vec<Arc<dyn ManagedResource>>>,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler
    pub fn new() -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        let (signal_tx, _) = broadcast::channel(8);

        Self {
            shutdown_requested: AtomicBool::new(false),
            executed: AtomicBool::new(false),
            phase,
            signal_tx,
            resources: Mutex::new(Vec::new()),
        }
    }

    /// Register a resource to release on shutdown
    pub async fn register(&self, resource: Arc<dyn ManagedResource>) {
        debug!("Registered shutdown resource: {}", resource.name());
        self.resources.lock().await.push(resource);
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.signal_tx.subscribe()
    }

    /// Get a receiver for phase changes
    pub fn phase_receiver(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Get current shutdown phase
    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Request shutdown with specified signal type
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }

        info!("Shutdown requested: {}", signal);
        let _ = self.signal_tx.send(signal);
    }

    /// Resolve once shutdown has been requested
    pub async fn wait_for_shutdown(&self) -> ShutdownSignal {
        let mut rx = self.signal_tx.subscribe();
        if self.is_shutdown_requested() {
            return ShutdownSignal::Graceful;
        }
        match rx.recv().await {
            Ok(signal) => signal,
            Err(_) => ShutdownSignal::Urgent,
        }
    }

    /// Drive `work` to completion unless shutdown is requested first
    ///
    /// Returns `None` when a shutdown request interrupted the work. The work
    /// future is dropped at that point.
    pub async fn run_until_shutdown<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            output = work => Some(output),
            signal = self.wait_for_shutdown() => {
                warn!("Interrupted by {} shutdown", signal);
                None
            }
        }
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.send_replace(phase);
        info!("Shutdown phase: {}", phase);
    }

    /// Mark that in-flight work is being drained by the caller
    pub fn begin_draining(&self) {
        if self.current_phase() == ShutdownPhase::Running {
            self.set_phase(ShutdownPhase::Draining);
        }
    }

    /// Release every registered resource, newest first
    ///
    /// Runs once; later calls return immediately.
    pub async fn execute(&self) {
        if self.executed.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already executed");
            return;
        }

        let start = Instant::now();
        self.set_phase(ShutdownPhase::Releasing);

        let resources: Vec<_> = self.resources.lock().await.drain(..).collect();
        for resource in resources.iter().rev() {
            info!("Releasing {}", resource.name());
            resource.release().await;
        }

        self.set_phase(ShutdownPhase::Complete);
        info!("Graceful shutdown completed in {:?}", start.elapsed());
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to install OS signal handlers
pub fn install_signal_handlers(shutdown: Arc<GracefulShutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let handlers = [
            (SignalKind::terminate(), "SIGTERM", ShutdownSignal::Graceful),
            (SignalKind::interrupt(), "SIGINT", ShutdownSignal::Graceful),
            (SignalKind::quit(), "SIGQUIT", ShutdownSignal::Urgent),
        ];

        for (kind, name, kind_signal) in handlers {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                match signal(kind) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("Received {}", name);
                        shutdown.request_shutdown(kind_signal);
                    }
                    Err(e) => error!("Failed to install {} handler: {}", name, e),
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    shutdown.request_shutdown(ShutdownSignal::Graceful);
                }
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct Recorder {
        name: String,
        log: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl ManagedResource for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn release(&self) {
            self.log.lock().unwrap().push(self.name.clone());
        }
    }

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(ShutdownSignal::Graceful.to_string(), "graceful");
        assert_eq!(ShutdownSignal::Urgent.to_string(), "urgent");
    }

    #[test]
    fn test_shutdown_phase_display() {
        assert_eq!(ShutdownPhase::Running.to_string(), "running");
        assert_eq!(ShutdownPhase::Releasing.to_string(), "releasing");
        assert_eq!(ShutdownPhase::Complete.to_string(), "complete");
    }

    #[tokio::test]
    async fn test_shutdown_request() {
        let shutdown = GracefulShutdown::new();

        assert!(!shutdown.is_shutdown_requested());
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Running);

        shutdown.request_shutdown(ShutdownSignal::Graceful);
        assert!(shutdown.is_shutdown_requested());

        // Duplicate request should be ignored
        shutdown.request_shutdown(ShutdownSignal::Urgent);
        assert!(shutdown.is_shutdown_requested());
        assert_eq!(shutdown.wait_for_shutdown().await, ShutdownSignal::Graceful);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_wakes_on_request() {
        let shutdown = Arc::new(GracefulShutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait_for_shutdown().await })
        };

        tokio::task::yield_now().await;
        shutdown.request_shutdown(ShutdownSignal::Urgent);

        let signal = waiter.await.unwrap();
        assert!(matches!(signal, ShutdownSignal::Urgent | ShutdownSignal::Graceful));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let shutdown = Arc::new(GracefulShutdown::new());
        assert_eq!(shutdown.run_until_shutdown(async { 7 }).await, Some(7));

        let pending = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                shutdown
                    .run_until_shutdown(std::future::pending::<()>())
                    .await
            })
        };
        tokio::task::yield_now().await;
        shutdown.request_shutdown(ShutdownSignal::Graceful);
        assert_eq!(pending.await.unwrap(), None);

        // Already requested: interrupted without polling further
        let late = shutdown
            .run_until_shutdown(std::future::pending::<()>())
            .await;
        assert_eq!(late, None);
    }

    #[tokio::test]
    async fn test_execute_releases_in_reverse_order_once() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let shutdown = GracefulShutdown::new();

        for name in ["database", "bus"] {
            shutdown
                .register(Arc::new(Recorder {
                    name: name.to_string(),
                    log: Arc::clone(&log),
                }))
                .await;
        }

        shutdown.begin_draining();
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Draining);

        shutdown.execute().await;
        shutdown.execute().await;

        assert_eq!(*log.lock().unwrap(), vec!["bus", "database"]);
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Complete);
    }
}
