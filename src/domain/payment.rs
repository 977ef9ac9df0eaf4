//! Payment entity, status lifecycle, and request/response models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    EWallet,
    Qris,
    Retail,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Retail => "retail",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "e_wallet" => Ok(PaymentMethod::EWallet),
            "qris" => Ok(PaymentMethod::Qris),
            "retail" => Ok(PaymentMethod::Retail),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Payment lifecycle status.
///
/// Pending and Processing are the unsettled states eligible for automatic
/// refresh against the gateway; Processing is reported by some gateways but
/// reconciled exactly like Pending. Refunded is reachable only from Success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Canceled,
    Refunded,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Expired => "expired",
        }
    }

    /// Whether the payment is still unsettled and should be refreshed from
    /// the gateway on read.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Cancellation is only permitted while the payment is unsettled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Refunds are only permitted for successful payments.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }

    /// Whether a reconciliation update from `self` to `next` is a legal
    /// lifecycle transition. Unsettled states may move anywhere, Success may
    /// only move to Refunded, and the remaining terminal states never move.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        if *self == next {
            return false;
        }
        match self {
            PaymentStatus::Pending | PaymentStatus::Processing => true,
            PaymentStatus::Success => next == PaymentStatus::Refunded,
            PaymentStatus::Failed
            | PaymentStatus::Canceled
            | PaymentStatus::Refunded
            | PaymentStatus::Expired => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            "refunded" => Ok(PaymentStatus::Refunded),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The single durable payment record.
///
/// `id` is assigned by this service and immutable; `order_id` is caller
/// assigned and may be shared by multiple payment attempts; `transaction_id`
/// is the gateway's reference. `amount` is immutable after creation, and
/// every status mutation refreshes `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Open key-value map for gateway artifacts: token, redirect URL,
    /// QR code URL, virtual account number, bank code.
    pub metadata: serde_json::Value,
}

/// Inbound request to create a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub order_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer_details: serde_json::Value,
    #[serde(default)]
    pub item_details: Vec<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Checkout expiry in hours.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u32,
}

fn default_expiry_hours() -> u32 {
    24
}

/// Inbound request to cancel a payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelPayment {
    pub reason: Option<String>,
}

/// Inbound request to refund a payment. A missing amount means a full
/// refund of the original stored amount.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundPayment {
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// A gateway notification after parsing, authentication, and status
/// normalization. This is the only shape the reconciliation service accepts
/// from the webhook path.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedNotification {
    pub transaction_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub payment_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_round_trips() {
        let all = [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Success,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
            PaymentStatus::Refunded,
            PaymentStatus::Expired,
        ];
        for status in all {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("SUCCESS".parse::<PaymentStatus>(), Ok(PaymentStatus::Success));
        assert!("settled".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_method_round_trips() {
        assert_eq!("e_wallet".parse::<PaymentMethod>(), Ok(PaymentMethod::EWallet));
        assert_eq!(PaymentMethod::Qris.to_string(), "qris");
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_unsettled_states_transition_anywhere() {
        for from in [PaymentStatus::Pending, PaymentStatus::Processing] {
            assert!(from.can_transition_to(PaymentStatus::Success));
            assert!(from.can_transition_to(PaymentStatus::Expired));
            assert!(from.can_transition_to(PaymentStatus::Canceled));
        }
    }

    #[test]
    fn test_success_only_moves_to_refunded() {
        assert!(PaymentStatus::Success.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn test_terminal_states_never_move() {
        for from in [
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
            PaymentStatus::Refunded,
            PaymentStatus::Expired,
        ] {
            assert!(!from.can_transition_to(PaymentStatus::Success));
            assert!(!from.can_transition_to(PaymentStatus::Pending));
            assert!(!from.needs_refresh());
        }
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));
    }
}
