//! Postgres implementation of the storage port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::storage::PaymentStore;

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, amount, method, status, \
     payment_url, metadata, created_at, updated_at";

/// Row shape for the `payments` table. Enums are stored as their lowercase
/// text forms and parsed back on read.
#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    transaction_id: String,
    amount: Decimal,
    method: String,
    status: String,
    payment_url: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> AppResult<Payment> {
        let method = self
            .method
            .parse()
            .map_err(|e: String| AppError::Storage(format!("corrupt payment row: {e}")))?;
        let status = self
            .status
            .parse()
            .map_err(|e: String| AppError::Storage(format!("corrupt payment row: {e}")))?;

        Ok(Payment {
            id: self.id,
            order_id: self.order_id,
            transaction_id: self.transaction_id,
            amount: self.amount,
            method,
            status,
            payment_url: self.payment_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata,
        })
    }
}

/// Production payment store backed by Postgres.
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn save(&self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, transaction_id, amount, method, status, \
             payment_url, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
                 status = EXCLUDED.status, \
                 payment_url = EXCLUDED.payment_url, \
                 metadata = EXCLUDED.metadata, \
                 updated_at = NOW()",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.transaction_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.payment_url)
        .bind(&payment.metadata)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(payment_id = %payment.id, "payment saved");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn get_by_order_id(&self, order_id: &str) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE order_id = $1 ORDER BY created_at DESC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> AppResult<Payment> {
        // Single statement: no read-modify-write window, and a concurrent
        // reader sees either the old row or the new one.
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_payment(),
            None => Err(AppError::NotFound(id.to_string())),
        }
    }
}
