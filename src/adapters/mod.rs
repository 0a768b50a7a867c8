pub mod channel_bus;
pub mod http_bus;
pub mod memory;
pub mod postgres;
pub mod yahoo;

pub use channel_bus::{ChannelPublisher, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use http_bus::HttpTopicPublisher;
pub use memory::MemoryQuoteStore;
pub use postgres::{PgConnector, PostgresQuoteStore};
pub use yahoo::{decode_chart, YahooQuoteSource, DEFAULT_INTERVAL, DEFAULT_YAHOO_BASE};
