//! Capability composition
//!
//! Turns configuration into concrete backends. Construction never connects:
//! the database pool is opened by its lifecycle on first use.

use std::sync::Arc;
use tracing::info;

use super::traits::{EventPublisher, QuoteSource, QuoteStore};
use crate::adapters::{
    ChannelPublisher, HttpTopicPublisher, MemoryQuoteStore, PgConnector, PostgresQuoteStore,
    YahooQuoteSource,
};
use crate::config::{AppConfig, BusBackend, StoreBackend};
use crate::coordination::{ManagedResource, ResourceLifecycle};
use crate::error::{QuoteSyncError, Result};
use crate::services::QuoteSyncPipeline;

/// The three capabilities a pipeline run needs
#[derive(Clone)]
pub struct Capabilities {
    pub source: Arc<dyn QuoteSource>,
    pub store: Arc<dyn QuoteStore>,
    pub publisher: Arc<dyn EventPublisher>,
}

pub struct CapabilityRegistry {
    capabilities: Capabilities,
    database: Option<Arc<ResourceLifecycle<PgConnector>>>,
    channel: Option<Arc<ChannelPublisher>>,
}

impl CapabilityRegistry {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(QuoteSyncError::InvalidConfig)?;

        let source: Arc<dyn QuoteSource> = Arc::new(YahooQuoteSource::new(
            &config.source.base_url,
            &config.source.interval,
            &config.source.user_agent,
        )?);

        let (store, database): (Arc<dyn QuoteStore>, _) = match config.store.backend {
            StoreBackend::Postgres => {
                let url = config.store.database_url.as_deref().unwrap_or_default();
                let lifecycle = Arc::new(ResourceLifecycle::new(PgConnector::new(
                    url,
                    config.store.max_connections,
                    config.store.run_migrations,
                )));
                let store = PostgresQuoteStore::new(Arc::clone(&lifecycle));
                (Arc::new(store), Some(lifecycle))
            }
            StoreBackend::Memory => (Arc::new(MemoryQuoteStore::new()), None),
        };

        let delivery = config.bus.delivery()?;
        let (publisher, channel): (Arc<dyn EventPublisher>, _) = match config.bus.backend {
            BusBackend::Http => {
                let topic_url = config.bus.topic_url.as_deref().unwrap_or_default();
                (Arc::new(HttpTopicPublisher::new(topic_url, delivery)?), None)
            }
            BusBackend::Channel => {
                let channel = Arc::new(ChannelPublisher::new(delivery, config.bus.channel_capacity));
                (Arc::clone(&channel) as Arc<dyn EventPublisher>, Some(channel))
            }
        };

        info!(
            store = store.backend(),
            bus = ?config.bus.backend,
            delivery = ?config.bus.delivery,
            "Capabilities registered"
        );

        Ok(Self {
            capabilities: Capabilities {
                source,
                store,
                publisher,
            },
            database,
            channel,
        })
    }

    /// Registry over caller-supplied backends, with no managed resources
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            database: None,
            channel: None,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn pipeline(&self) -> QuoteSyncPipeline {
        let c = &self.capabilities;
        QuoteSyncPipeline::new(
            Arc::clone(&c.source),
            Arc::clone(&c.store),
            Arc::clone(&c.publisher),
        )
    }

    /// The in-process topic, when the channel bus is configured
    pub fn channel_bus(&self) -> Option<Arc<ChannelPublisher>> {
        self.channel.clone()
    }

    /// The shared database lifecycle, when the postgres store is configured
    pub fn database(&self) -> Option<Arc<ResourceLifecycle<PgConnector>>> {
        self.database.clone()
    }

    /// Resources to release at process termination, in acquisition order
    pub fn managed_resources(&self) -> Vec<Arc<dyn ManagedResource>> {
        let mut resources: Vec<Arc<dyn ManagedResource>> = Vec::new();
        if let Some(database) = &self.database {
            resources.push(Arc::clone(database) as Arc<dyn ManagedResource>);
        }
        if let Some(channel) = &self.channel {
            resources.push(Arc::clone(channel) as Arc<dyn ManagedResource>);
        }
        resources
    }
}
