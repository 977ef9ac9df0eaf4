//! Midtrans gateway adapter.
//!
//! Transaction creation goes through the Snap API (hosted checkout);
//! status, cancel, and refund go through the core v2 API. All calls carry
//! Basic auth derived from the server key and a bounded timeout.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::payment::{CreatePayment, PaymentMethod, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::gateway::{normalize_status, validate_create, GatewayTransaction, PaymentGateway};

use async_trait::async_trait;

const PRODUCTION_API_URL: &str = "https://api.midtrans.com/v2";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com/v2";
const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";

/// Midtrans adapter configuration.
#[derive(Debug, Clone)]
pub struct MidtransConfig {
    /// Server key, used for Basic auth and webhook signatures.
    pub server_key: String,
    /// Client key, exposed to checkout frontends.
    pub client_key: String,
    /// Selects the production or sandbox environment.
    pub production: bool,
    /// Per-call network timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MidtransConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            client_key: String::new(),
            production: false,
            timeout_secs: 30,
        }
    }
}

impl MidtransConfig {
    fn api_url(&self) -> &'static str {
        if self.production {
            PRODUCTION_API_URL
        } else {
            SANDBOX_API_URL
        }
    }

    fn snap_url(&self) -> &'static str {
        if self.production {
            PRODUCTION_SNAP_URL
        } else {
            SANDBOX_SNAP_URL
        }
    }
}

/// Production implementation of the gateway port against Midtrans.
pub struct MidtransGateway {
    config: MidtransConfig,
    client: Client,
    auth_header: String,
}

impl MidtransGateway {
    pub fn new(config: MidtransConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        // Midtrans Basic auth is base64("<server_key>:").
        let auth_header = format!("Basic {}", BASE64.encode(format!("{}:", config.server_key)));

        Ok(Self {
            config,
            client,
            auth_header,
        })
    }

    /// Per-method Snap configuration: which payment channels to enable and
    /// their channel-specific options.
    fn method_config(method: PaymentMethod) -> Value {
        match method {
            PaymentMethod::CreditCard => json!({
                "enabled_payments": ["credit_card"],
                "credit_card": {"secure": true},
            }),
            PaymentMethod::BankTransfer => json!({
                "enabled_payments": ["bank_transfer"],
                "bank_transfer": {"bank": "bca"},
            }),
            PaymentMethod::EWallet => json!({
                "enabled_payments": ["gopay"],
                "gopay": {"enable_callback": true},
            }),
            PaymentMethod::Qris => json!({
                "enabled_payments": ["qris"],
                "qris": {"acquirer": "gopay"},
            }),
            PaymentMethod::Retail => json!({
                "enabled_payments": ["cstore"],
                "cstore": {"store": "indomaret"},
            }),
        }
    }

    fn gross_amount(amount: Decimal) -> AppResult<i64> {
        amount
            .trunc()
            .to_i64()
            .ok_or_else(|| AppError::Validation("amount out of range".into()))
    }

    /// Pull a human-readable message out of a Midtrans error body. Midtrans
    /// reports errors as an `error_messages` array; fall back to the raw
    /// body when that is absent.
    fn error_message(body: &str) -> String {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if let Some(messages) = value.get("error_messages").and_then(Value::as_array) {
                let joined: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
                if !joined.is_empty() {
                    return joined.join("; ");
                }
            }
            if let Some(message) = value.get("status_message").and_then(Value::as_str) {
                return message.to_string();
            }
        }
        body.to_string()
    }

    async fn post(&self, url: &str, payload: Option<&Value>) -> AppResult<Value> {
        let mut request = self
            .client
            .post(url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Gateway {
                status: None,
                message: format!("request to gateway failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::Gateway {
                status: Some(status.as_u16()),
                message: Self::error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| AppError::Gateway {
            status: Some(status.as_u16()),
            message: format!("invalid gateway response: {e}"),
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_transaction(&self, request: &CreatePayment) -> AppResult<GatewayTransaction> {
        validate_create(request)?;

        let mut payload = json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": Self::gross_amount(request.amount)?,
            },
            "customer_details": request.customer_details,
            "item_details": request.item_details,
        });

        if request.expiry_hours > 0 {
            payload["expiry"] = json!({
                "unit": "hour",
                "duration": request.expiry_hours,
            });
        }

        if let (Some(base), Value::Object(config)) = (
            payload.as_object_mut(),
            Self::method_config(request.payment_method),
        ) {
            base.extend(config);
        }

        info!(
            order_id = %request.order_id,
            method = %request.payment_method,
            "creating gateway transaction"
        );

        let body = self.post(self.config.snap_url(), Some(&payload)).await?;

        let token = body.get("token").and_then(Value::as_str).map(String::from);
        let redirect_url = body
            .get("redirect_url")
            .and_then(Value::as_str)
            .map(String::from);

        info!(order_id = %request.order_id, "gateway transaction created");

        Ok(GatewayTransaction {
            token,
            redirect_url,
            raw: body,
        })
    }

    async fn query_status(&self, reference: &str) -> PaymentStatus {
        let url = format!("{}/{}/status", self.config.api_url(), reference);

        let response = match self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(reference, "status query failed: {e}");
                return PaymentStatus::Pending;
            }
        };

        if !response.status().is_success() {
            warn!(
                reference,
                upstream = response.status().as_u16(),
                "gateway returned non-success for status query"
            );
            return PaymentStatus::Pending;
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(reference, "unparseable status response: {e}");
                return PaymentStatus::Pending;
            }
        };

        let transaction_status = body
            .get("transaction_status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fraud_status = body.get("fraud_status").and_then(Value::as_str);

        normalize_status(transaction_status, fraud_status)
    }

    async fn cancel(&self, reference: &str) -> AppResult<()> {
        let url = format!("{}/{}/cancel", self.config.api_url(), reference);
        self.post(&url, None).await?;
        info!(reference, "gateway transaction canceled");
        Ok(())
    }

    async fn refund(
        &self,
        reference: &str,
        amount: Decimal,
        reason: Option<&str>,
    ) -> AppResult<()> {
        let url = format!("{}/{}/refund", self.config.api_url(), reference);
        let payload = json!({
            "refund_key": format!("refund-{}-{}", reference, chrono::Utc::now().timestamp()),
            "amount": Self::gross_amount(amount)?,
            "reason": reason.unwrap_or("Customer requested refund"),
        });
        self.post(&url, Some(&payload)).await?;
        info!(reference, %amount, "gateway transaction refunded");
        Ok(())
    }
}
