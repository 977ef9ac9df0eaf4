//! Storage port: durable persistence of payment records.
//!
//! One production implementation ([`postgres::PgPaymentStore`]) plus the
//! in-memory double under `tests/`. Pool initialization lives here so the
//! process owns a single pool sized for concurrent request volume.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::AppResult;

pub mod postgres;

pub use postgres::PgPaymentStore;

/// Port to the payment store.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Upsert keyed by payment id: an existing record has its mutable
    /// fields overwritten and `updated_at` refreshed; a new record is
    /// inserted with the caller-supplied timestamps.
    async fn save(&self, payment: &Payment) -> AppResult<()>;

    async fn get_by_id(&self, id: &str) -> AppResult<Option<Payment>>;

    /// All payments for an order, newest first. Index 0 is the active
    /// payment for reconciliation.
    async fn get_by_order_id(&self, order_id: &str) -> AppResult<Vec<Payment>>;

    /// Set the status and refresh `updated_at` atomically, in a single
    /// statement. Fails with a not-found error when no record exists.
    async fn update_status(&self, id: &str, status: PaymentStatus) -> AppResult<Payment>;
}

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Initialize the process-wide connection pool.
pub async fn init_pool(database_url: &str, config: PoolConfig) -> AppResult<PgPool> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("failed to initialize database pool: {e}");
            crate::error::AppError::from(e)
        })?;

    info!("database pool initialized");
    Ok(pool)
}

/// Cheap connectivity probe used by the health endpoint.
pub async fn health_check(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
