pub mod metrics;
pub mod pipeline;
pub mod server;

pub use metrics::PipelineMetrics;
pub use pipeline::{PipelineOutcome, QuoteSyncPipeline};
pub use server::{router, serve, AppState};
