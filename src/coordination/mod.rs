//! Coordination Layer
//!
//! - Lifecycle of the process-wide shared connection
//! - Graceful shutdown on termination signals

pub mod lifecycle;
pub mod shutdown;

pub use lifecycle::{Connector, Lease, LifecycleState, ManagedResource, ResourceLifecycle};
pub use shutdown::{install_signal_handlers, GracefulShutdown, ShutdownPhase, ShutdownSignal};
