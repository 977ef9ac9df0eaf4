//! Gateway port: the capability boundary to the external payment provider.
//!
//! One production implementation ([`midtrans::MidtransGateway`]) plus the
//! test doubles under `tests/`. The status vocabulary mapping lives here as
//! a single function so the polling and webhook paths can never disagree.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::payment::{CreatePayment, PaymentStatus};
use crate::error::{AppError, AppResult};

pub mod midtrans;

pub use midtrans::{MidtransConfig, MidtransGateway};

/// Artifacts returned by the gateway when a transaction is created.
#[derive(Debug, Clone)]
pub struct GatewayTransaction {
    /// Checkout token, when the gateway issues one.
    pub token: Option<String>,
    /// Hosted checkout page URL.
    pub redirect_url: Option<String>,
    /// Full gateway response body, kept in payment metadata for audit.
    pub raw: serde_json::Value,
}

/// Port to the external payment gateway.
///
/// All references passed to `query_status`, `cancel`, and `refund` are the
/// caller-assigned order id, which is the reference the gateway indexes
/// transactions by.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote transaction. Caller input is validated before any
    /// network call; an upstream rejection surfaces as a gateway error with
    /// the upstream status and message.
    async fn create_transaction(&self, request: &CreatePayment) -> AppResult<GatewayTransaction>;

    /// Query the current normalized status of a transaction.
    ///
    /// Infallible by contract: gateway unavailability or a malformed
    /// response yields [`PaymentStatus::Pending`], meaning "no new
    /// information", never an error.
    async fn query_status(&self, reference: &str) -> PaymentStatus;

    /// Cancel an unsettled transaction. Write-path failures surface.
    async fn cancel(&self, reference: &str) -> AppResult<()>;

    /// Refund a settled transaction. The amount is always explicit here;
    /// resolution of an omitted caller amount to the stored original happens
    /// in the reconciliation service.
    async fn refund(&self, reference: &str, amount: Decimal, reason: Option<&str>)
        -> AppResult<()>;
}

/// Map the gateway's raw status vocabulary onto [`PaymentStatus`].
///
/// This is the one mapping shared by the polling path and the webhook path.
/// A fraud verdict of "deny" overrides whatever the transaction status says,
/// and unrecognized values fall back to Pending rather than failing.
pub fn normalize_status(transaction_status: &str, fraud_status: Option<&str>) -> PaymentStatus {
    if fraud_status == Some("deny") {
        return PaymentStatus::Failed;
    }

    match transaction_status.to_ascii_lowercase().as_str() {
        "capture" | "settlement" => PaymentStatus::Success,
        "pending" => PaymentStatus::Pending,
        "deny" => PaymentStatus::Failed,
        "cancel" => PaymentStatus::Canceled,
        "expire" => PaymentStatus::Expired,
        "refund" | "partial_refund" => PaymentStatus::Refunded,
        _ => PaymentStatus::Pending,
    }
}

/// Validate a create request before it reaches the network.
pub fn validate_create(request: &CreatePayment) -> AppResult<()> {
    if request.order_id.trim().is_empty() {
        return Err(AppError::Validation("order_id must not be empty".into()));
    }
    if request.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "amount must be greater than 0".into(),
        ));
    }
    Ok(())
}
