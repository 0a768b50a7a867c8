//! Capability contracts and their composition
//!
//! - [`traits`] - `QuoteSource`, `QuoteStore`, `EventPublisher`
//! - [`registry`] - builds concrete backends from configuration

pub mod registry;
pub mod traits;

pub use registry::{Capabilities, CapabilityRegistry};
pub use traits::{EventPublisher, QuoteSource, QuoteStore};

#[cfg(test)]
pub use traits::{MockEventPublisher, MockQuoteSource, MockQuoteStore};
