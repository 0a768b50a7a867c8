use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::capability::QuoteStore;
use crate::coordination::{Connector, ResourceLifecycle};
use crate::domain::{Instrument, Quote};
use crate::error::{QuoteSyncError, Result};

/// Opens and closes the process-wide PostgreSQL pool
pub struct PgConnector {
    database_url: String,
    max_connections: u32,
    run_migrations: bool,
}

impl PgConnector {
    pub fn new(database_url: &str, max_connections: u32, run_migrations: bool) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections,
            run_migrations,
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    fn name(&self) -> &str {
        "postgres"
    }

    async fn connect(&self) -> Result<PgPool> {
        info!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;

        if self.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        info!("Connected to PostgreSQL");
        Ok(pool)
    }

    async fn close(&self, pool: &PgPool) {
        info!("Closing PostgreSQL pool");
        pool.close().await;
        info!("PostgreSQL pool closed");
    }
}

/// Document-style instrument store
///
/// One row per instrument with the quote held as a JSONB document. The pool
/// belongs to the shared lifecycle; each call holds a lease for its duration.
#[derive(Clone)]
pub struct PostgresQuoteStore {
    lifecycle: Arc<ResourceLifecycle<PgConnector>>,
}

impl PostgresQuoteStore {
    pub fn new(lifecycle: Arc<ResourceLifecycle<PgConnector>>) -> Self {
        Self { lifecycle }
    }

    fn instrument_from_row(row: &PgRow) -> Result<Instrument> {
        let quote: Option<Json<Quote>> = row.try_get("quote")?;
        let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at")?;
        Ok(Instrument {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            name: row.try_get("name")?,
            isin: row.try_get("isin")?,
            quote: quote.map(|q| q.0),
            deleted_at,
        })
    }
}

#[async_trait]
impl QuoteStore for PostgresQuoteStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, quote))]
    async fn persist(&self, symbol: &str, quote: &Quote) -> Result<()> {
        let pool = self.lifecycle.acquire().await?;

        sqlx::query(
            r#"
            INSERT INTO instruments (id, symbol, quote, updated_at)
            VALUES ($1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET
                quote = EXCLUDED.quote,
                updated_at = NOW()
            "#,
        )
        .bind(symbol)
        .bind(Json(quote))
        .execute(&*pool)
        .await?;

        debug!("Upserted quote for {}", symbol);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Instrument> {
        let pool = self.lifecycle.acquire().await?;

        let row = sqlx::query(
            r#"
            SELECT id, symbol, name, isin, quote, deleted_at
            FROM instruments
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&*pool)
        .await?;

        match row {
            Some(row) => Self::instrument_from_row(&row),
            None => Err(QuoteSyncError::NotFound(format!("instrument {id}"))),
        }
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<Instrument> {
        let pool = self.lifecycle.acquire().await?;

        let row = sqlx::query(
            r#"
            SELECT id, symbol, name, isin, quote, deleted_at
            FROM instruments
            WHERE symbol = $1 AND deleted_at IS NULL
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&*pool)
        .await?;

        match row {
            Some(row) => Self::instrument_from_row(&row),
            None => Err(QuoteSyncError::NotFound(format!("instrument with symbol {symbol}"))),
        }
    }
}
