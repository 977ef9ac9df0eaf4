//! Inbound webhook processing: authentication, payload validation, and
//! normalization into the reconciliation service's update path.

use rust_decimal::Decimal;
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::payment::NormalizedNotification;
use crate::error::{AppError, AppResult};
use crate::gateway::normalize_status;
use crate::service::{NotificationOutcome, PaymentService};

/// Fields a notification must carry before it is processed at all.
const REQUIRED_FIELDS: [&str; 5] = [
    "transaction_id",
    "order_id",
    "transaction_status",
    "gross_amount",
    "payment_type",
];

/// Verifies that a notification genuinely originated from the gateway.
///
/// The gateway signs each notification with
/// `sha512(order_id + status_code + gross_amount + server_key)` — fixed
/// field order, no delimiters — and sends the hex digest as
/// `signature_key`. Any missing field or type mismatch is a verification
/// failure, never an error.
pub struct SignatureVerifier {
    server_key: String,
}

impl SignatureVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    pub fn verify(&self, payload: &Value) -> bool {
        let (Some(order_id), Some(status_code), Some(gross_amount), Some(signature_key)) = (
            payload.get("order_id").and_then(Value::as_str),
            payload.get("status_code").and_then(Value::as_str),
            payload.get("gross_amount").and_then(Value::as_str),
            payload.get("signature_key").and_then(Value::as_str),
        ) else {
            return false;
        };

        let expected = Self::digest(order_id, status_code, gross_amount, &self.server_key);
        expected == signature_key
    }

    fn digest(order_id: &str, status_code: &str, gross_amount: &str, key: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Parses and authenticates raw gateway notifications, then delegates to
/// the reconciliation service.
pub struct WebhookProcessor {
    service: Arc<PaymentService>,
    verifier: SignatureVerifier,
}

impl WebhookProcessor {
    pub fn new(service: Arc<PaymentService>, verifier: SignatureVerifier) -> Self {
        Self { service, verifier }
    }

    /// Process a raw notification payload.
    ///
    /// Required-field validation and signature verification are independent
    /// checks and both must pass; a payload missing fields reports as
    /// malformed even when its signature would also fail. Nothing is
    /// persisted unless both checks succeed.
    pub async fn process(&self, payload: &Value, verify: bool) -> AppResult<NotificationOutcome> {
        for field in REQUIRED_FIELDS {
            if payload.get(field).is_none() {
                return Err(AppError::MalformedPayload(format!(
                    "missing required field: {field}"
                )));
            }
        }

        if verify && !self.verifier.verify(payload) {
            warn!("webhook rejected: signature mismatch");
            return Err(AppError::InvalidSignature);
        }

        let notification = normalize_notification(payload)?;
        info!(
            order_id = %notification.order_id,
            status = %notification.status,
            "processing gateway notification"
        );

        self.service.handle_notification(notification).await
    }
}

/// Translate a raw gateway payload into a [`NormalizedNotification`],
/// applying the same status mapping the polling path uses.
pub fn normalize_notification(payload: &Value) -> AppResult<NormalizedNotification> {
    let field = |name: &str| -> AppResult<&str> {
        payload
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::MalformedPayload(format!("field '{name}' must be a string")))
    };

    let transaction_status = field("transaction_status")?;
    let fraud_status = payload.get("fraud_status").and_then(Value::as_str);
    let status = normalize_status(transaction_status, fraud_status);

    let amount = match payload.get("gross_amount") {
        Some(Value::String(s)) => Decimal::from_str(s).map_err(|e| {
            AppError::MalformedPayload(format!("unparseable gross_amount '{s}': {e}"))
        })?,
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).map_err(|e| {
            AppError::MalformedPayload(format!("unparseable gross_amount '{n}': {e}"))
        })?,
        _ => {
            return Err(AppError::MalformedPayload(
                "field 'gross_amount' must be a string or number".into(),
            ))
        }
    };

    Ok(NormalizedNotification {
        transaction_id: field("transaction_id")?.to_string(),
        order_id: field("order_id")?.to_string(),
        status,
        amount,
        payment_type: field("payment_type")?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use serde_json::json;

    const KEY: &str = "SB-Mid-server-test";

    fn signed_payload(order_id: &str, status_code: &str, gross_amount: &str) -> Value {
        let signature = SignatureVerifier::digest(order_id, status_code, gross_amount, KEY);
        json!({
            "order_id": order_id,
            "status_code": status_code,
            "gross_amount": gross_amount,
            "signature_key": signature,
        })
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = SignatureVerifier::new(KEY);
        let payload = signed_payload("ORD-1", "200", "100000.00");
        assert!(verifier.verify(&payload));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let verifier = SignatureVerifier::new("some-other-key");
        let payload = signed_payload("ORD-1", "200", "100000.00");
        assert!(!verifier.verify(&payload));
    }

    #[test]
    fn test_tampered_amount_rejected() {
        let verifier = SignatureVerifier::new(KEY);
        let mut payload = signed_payload("ORD-1", "200", "100000.00");
        payload["gross_amount"] = json!("1.00");
        assert!(!verifier.verify(&payload));
    }

    #[test]
    fn test_missing_signature_fields_fail_closed() {
        let verifier = SignatureVerifier::new(KEY);
        assert!(!verifier.verify(&json!({})));
        assert!(!verifier.verify(&json!({"order_id": "ORD-1"})));
        // Type mismatch counts as a verification failure, not an error.
        let mut payload = signed_payload("ORD-1", "200", "100000.00");
        payload["gross_amount"] = json!(100000);
        assert!(!verifier.verify(&payload));
    }

    #[test]
    fn test_normalize_notification_maps_status() {
        let payload = json!({
            "transaction_id": "tx-1",
            "order_id": "ORD-1",
            "transaction_status": "settlement",
            "gross_amount": "50000.00",
            "payment_type": "qris",
        });
        let notification = normalize_notification(&payload).unwrap();
        assert_eq!(notification.status, PaymentStatus::Success);
        assert_eq!(notification.amount, Decimal::from_str("50000.00").unwrap());
    }

    #[test]
    fn test_normalize_notification_fraud_deny_wins() {
        let payload = json!({
            "transaction_id": "tx-1",
            "order_id": "ORD-1",
            "transaction_status": "capture",
            "fraud_status": "deny",
            "gross_amount": "50000",
            "payment_type": "credit_card",
        });
        let notification = normalize_notification(&payload).unwrap();
        assert_eq!(notification.status, PaymentStatus::Failed);
    }

    #[test]
    fn test_normalize_notification_accepts_numeric_amount() {
        let payload = json!({
            "transaction_id": "tx-1",
            "order_id": "ORD-1",
            "transaction_status": "pending",
            "gross_amount": 75000,
            "payment_type": "qris",
        });
        let notification = normalize_notification(&payload).unwrap();
        assert_eq!(notification.amount, Decimal::from(75000));
    }

    #[test]
    fn test_normalize_notification_rejects_garbage_amount() {
        let payload = json!({
            "transaction_id": "tx-1",
            "order_id": "ORD-1",
            "transaction_status": "pending",
            "gross_amount": "not-a-number",
            "payment_type": "qris",
        });
        let err = normalize_notification(&payload).unwrap_err();
        assert_eq!(err.code(), "malformed_payload");
    }
}
