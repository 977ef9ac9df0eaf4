//! Reconciliation service: the orchestrator that keeps stored payment state
//! consistent with gateway-reported state.
//!
//! Three update paths converge here — read-through refresh, force-check,
//! and webhook notifications — and all of them persist through the same
//! transition rule, so none of them can apply an update the lifecycle
//! forbids. There is deliberately no payment-level locking: `update_status`
//! is atomic per record and concurrent paths are last-write-wins.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::payment::{
    CreatePayment, NormalizedNotification, Payment, PaymentStatus,
};
use crate::error::{AppError, AppResult};
use crate::gateway::PaymentGateway;
use crate::storage::PaymentStore;

/// Outcome of a notification-driven update, returned to the webhook caller
/// for observability. `Warning` covers notifications for orders this
/// deployment has never seen; those are logged and acknowledged, not failed.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub payment_id: Option<String>,
    pub previous_status: Option<PaymentStatus>,
    pub new_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Warning,
}

/// Payment orchestrator over the gateway and storage ports.
///
/// Constructed once at process start with its ports injected; handlers share
/// it behind an `Arc`.
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn PaymentStore>,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn PaymentStore>) -> Self {
        Self { gateway, store }
    }

    /// Create a payment: gateway transaction first, durable record second.
    ///
    /// A failed gateway call stores nothing. A failed save after a
    /// successful gateway call leaves the gateway holding a transaction we
    /// do not know about; that inconsistency is surfaced to the caller for
    /// operator reconciliation, never swallowed.
    pub async fn create(&self, request: CreatePayment) -> AppResult<Payment> {
        let transaction = self.gateway.create_transaction(&request).await?;

        let now = chrono::Utc::now();
        let mut metadata = serde_json::Map::new();
        if let Some(token) = &transaction.token {
            metadata.insert("token".into(), serde_json::Value::String(token.clone()));
        }
        if let Some(url) = &transaction.redirect_url {
            metadata.insert(
                "redirect_url".into(),
                serde_json::Value::String(url.clone()),
            );
        }
        metadata.insert("expiry_hours".into(), request.expiry_hours.into());
        metadata.insert("gateway_response".into(), transaction.raw);

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: request.order_id.clone(),
            // Midtrans indexes Snap transactions by the order id.
            transaction_id: request.order_id,
            amount: request.amount,
            method: request.payment_method,
            status: PaymentStatus::Pending,
            payment_url: transaction.redirect_url,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Value::Object(metadata),
        };

        if let Err(e) = self.store.save(&payment).await {
            error!(
                payment_id = %payment.id,
                order_id = %payment.order_id,
                "gateway transaction exists but save failed, operator reconciliation required: {e}"
            );
            return Err(e);
        }

        info!(payment_id = %payment.id, order_id = %payment.order_id, "payment created");
        Ok(payment)
    }

    /// Read a payment, refreshing unsettled records from the gateway.
    ///
    /// Gateway unavailability never fails this call: the adapter degrades to
    /// Pending, which is never a permitted transition away from the stored
    /// state, so the stale record is returned as-is.
    pub async fn get(&self, payment_id: &str) -> AppResult<Payment> {
        let payment = self.load(payment_id).await?;

        if !payment.status.needs_refresh() {
            return Ok(payment);
        }

        let latest = self.gateway.query_status(&payment.order_id).await;
        match self.apply(&payment, latest, "refresh").await? {
            Some(updated) => Ok(updated),
            None => Ok(payment),
        }
    }

    /// Force-check: always query the gateway and hand the caller the
    /// gateway-reported status explicitly, persisting it when the lifecycle
    /// allows.
    pub async fn check_status(&self, payment_id: &str) -> AppResult<PaymentStatus> {
        let payment = self.load(payment_id).await?;
        let latest = self.gateway.query_status(&payment.order_id).await;
        self.apply(&payment, latest, "force-check").await?;
        Ok(latest)
    }

    /// Cancel an unsettled payment. Storage is set to Canceled on gateway
    /// success regardless of the gateway's response body; cancellation
    /// success implies the canceled state by contract.
    pub async fn cancel(&self, payment_id: &str, reason: Option<&str>) -> AppResult<Payment> {
        let payment = self.load(payment_id).await?;

        if !payment.status.can_cancel() {
            return Err(AppError::InvalidState {
                operation: "cancel",
                status: payment.status,
            });
        }

        self.gateway.cancel(&payment.order_id).await?;

        info!(
            payment_id = %payment.id,
            reason = reason.unwrap_or("none"),
            "payment canceled"
        );
        self.store
            .update_status(&payment.id, PaymentStatus::Canceled)
            .await
    }

    /// Refund a successful payment. An omitted amount means the full
    /// original amount; the stored record is the source of truth for it,
    /// since `amount` is immutable after creation.
    pub async fn refund(
        &self,
        payment_id: &str,
        amount: Option<Decimal>,
        reason: Option<&str>,
    ) -> AppResult<Payment> {
        let payment = self.load(payment_id).await?;

        if !payment.status.can_refund() {
            return Err(AppError::InvalidState {
                operation: "refund",
                status: payment.status,
            });
        }

        if let Some(requested) = amount {
            if requested <= Decimal::ZERO {
                return Err(AppError::Validation(
                    "refund amount must be greater than 0".into(),
                ));
            }
            if requested > payment.amount {
                return Err(AppError::Validation(format!(
                    "refund amount {requested} exceeds original amount {}",
                    payment.amount
                )));
            }
        }
        let amount = amount.unwrap_or(payment.amount);

        self.gateway
            .refund(&payment.order_id, amount, reason)
            .await?;

        info!(payment_id = %payment.id, %amount, "payment refunded");
        self.store
            .update_status(&payment.id, PaymentStatus::Refunded)
            .await
    }

    /// Apply a gateway notification to the active payment of its order.
    ///
    /// Idempotent: an unchanged status is a no-op, and a repeated
    /// notification produces no second write. An order with no stored
    /// payment is a warning, not an error — the gateway may notify about
    /// orders predating this deployment or test traffic.
    pub async fn handle_notification(
        &self,
        notification: NormalizedNotification,
    ) -> AppResult<NotificationOutcome> {
        let payments = self.store.get_by_order_id(&notification.order_id).await?;

        let Some(payment) = payments.into_iter().next() else {
            warn!(
                order_id = %notification.order_id,
                "notification for unknown order, ignoring"
            );
            return Ok(NotificationOutcome {
                status: OutcomeStatus::Warning,
                message: "no payment found for order".into(),
                payment_id: None,
                previous_status: None,
                new_status: None,
            });
        };

        let previous = payment.status;
        let updated = self
            .apply(&payment, notification.status, "notification")
            .await?;

        let (message, new_status) = match updated {
            Some(updated) => ("payment status updated".into(), updated.status),
            None if previous == notification.status => {
                ("status unchanged, no-op".into(), previous)
            }
            None => (
                format!(
                    "transition from '{previous}' to '{}' not permitted, ignored",
                    notification.status
                ),
                previous,
            ),
        };

        Ok(NotificationOutcome {
            status: OutcomeStatus::Success,
            message,
            payment_id: Some(payment.id),
            previous_status: Some(previous),
            new_status: Some(new_status),
        })
    }

    /// All payments for an order, newest first.
    pub async fn list_by_order(&self, order_id: &str) -> AppResult<Vec<Payment>> {
        self.store.get_by_order_id(order_id).await
    }

    /// Operator/testing override: set a status directly, bypassing the
    /// gateway but not the storage atomicity guarantees.
    pub async fn override_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> AppResult<Payment> {
        warn!(payment_id, %status, "manual status override");
        self.store.update_status(payment_id, status).await
    }

    async fn load(&self, payment_id: &str) -> AppResult<Payment> {
        self.store
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(payment_id.to_string()))
    }

    /// The one persistence rule shared by all three update paths: write the
    /// gateway-reported status only when it differs from the stored status
    /// and the lifecycle permits the move. Returns the updated record when a
    /// write happened.
    async fn apply(
        &self,
        payment: &Payment,
        latest: PaymentStatus,
        path: &'static str,
    ) -> AppResult<Option<Payment>> {
        if latest == payment.status {
            return Ok(None);
        }
        if !payment.status.can_transition_to(latest) {
            warn!(
                payment_id = %payment.id,
                from = %payment.status,
                to = %latest,
                path,
                "discarding status update, transition not permitted"
            );
            return Ok(None);
        }

        info!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %latest,
            path,
            "updating payment status"
        );
        self.store.update_status(&payment.id, latest).await.map(Some)
    }
}
