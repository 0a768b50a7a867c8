pub mod adapters;
pub mod capability;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod services;

pub use capability::{Capabilities, CapabilityRegistry, EventPublisher, QuoteSource, QuoteStore};
pub use config::AppConfig;
pub use coordination::{
    GracefulShutdown, LifecycleState, ResourceLifecycle, ShutdownPhase, ShutdownSignal,
};
pub use domain::{Instrument, Notification, Quote, UpdateEvent};
pub use error::{QuoteSyncError, Result};
pub use services::{PipelineMetrics, PipelineOutcome, QuoteSyncPipeline};
