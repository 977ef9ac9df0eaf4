//! In-memory test doubles for the gateway and storage ports.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use payment_orchestrator::domain::payment::{
    CreatePayment, Payment, PaymentMethod, PaymentStatus,
};
use payment_orchestrator::error::{AppError, AppResult};
use payment_orchestrator::gateway::{validate_create, GatewayTransaction, PaymentGateway};
use payment_orchestrator::service::PaymentService;
use payment_orchestrator::storage::PaymentStore;

/// Scripted gateway double. `status` drives `query_status`; the failure
/// flags make the write paths reject; counters record traffic.
#[derive(Default)]
pub struct StubGateway {
    pub status: Mutex<Option<PaymentStatus>>,
    pub fail_create: AtomicBool,
    pub fail_writes: AtomicBool,
    pub status_queries: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub refund_amounts: Mutex<Vec<Decimal>>,
}

impl StubGateway {
    pub fn set_status(&self, status: PaymentStatus) {
        *self.status.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_transaction(&self, request: &CreatePayment) -> AppResult<GatewayTransaction> {
        validate_create(request)?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Gateway {
                status: Some(500),
                message: "gateway rejected transaction".into(),
            });
        }
        Ok(GatewayTransaction {
            token: Some("tok-test".into()),
            redirect_url: Some(format!(
                "https://gateway.test/checkout/{}",
                request.order_id
            )),
            raw: json!({"token": "tok-test"}),
        })
    }

    async fn query_status(&self, _reference: &str) -> PaymentStatus {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        // Unreachable-gateway behavior: no scripted status means Pending.
        self.status.lock().unwrap().unwrap_or(PaymentStatus::Pending)
    }

    async fn cancel(&self, _reference: &str) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Gateway {
                status: None,
                message: "gateway unreachable".into(),
            });
        }
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refund(
        &self,
        _reference: &str,
        amount: Decimal,
        _reason: Option<&str>,
    ) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Gateway {
                status: None,
                message: "gateway unreachable".into(),
            });
        }
        self.refund_amounts.lock().unwrap().push(amount);
        Ok(())
    }
}

/// In-memory payment store with upsert and atomic status-update semantics.
#[derive(Default)]
pub struct MemoryStore {
    pub payments: Mutex<Vec<Payment>>,
    pub fail_save: AtomicBool,
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn save(&self, payment: &Payment) -> AppResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(AppError::Storage("save failed".into()));
        }
        let mut payments = self.payments.lock().unwrap();
        if let Some(existing) = payments.iter_mut().find(|p| p.id == payment.id) {
            existing.status = payment.status;
            existing.payment_url = payment.payment_url.clone();
            existing.metadata = payment.metadata.clone();
            existing.updated_at = Utc::now();
        } else {
            payments.push(payment.clone());
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Option<Payment>> {
        let payments = self.payments.lock().unwrap();
        Ok(payments.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_order_id(&self, order_id: &str) -> AppResult<Vec<Payment>> {
        let payments = self.payments.lock().unwrap();
        let mut matching: Vec<Payment> = payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> AppResult<Payment> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        payment.status = status;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }
}

pub struct Harness {
    pub gateway: Arc<StubGateway>,
    pub store: Arc<MemoryStore>,
    pub service: Arc<PaymentService>,
}

pub fn harness() -> Harness {
    let gateway = Arc::new(StubGateway::default());
    let store = Arc::new(MemoryStore::default());
    let service = Arc::new(PaymentService::new(gateway.clone(), store.clone()));
    Harness {
        gateway,
        store,
        service,
    }
}

pub fn create_request(order_id: &str, amount: i64, method: PaymentMethod) -> CreatePayment {
    CreatePayment {
        order_id: order_id.to_string(),
        amount: Decimal::from(amount),
        payment_method: method,
        customer_details: json!({"first_name": "Ana", "email": "ana@example.com"}),
        item_details: vec![json!({"id": "item-1", "price": amount, "quantity": 1, "name": "Ticket"})],
        description: None,
        expiry_hours: 24,
    }
}

/// Seed a stored payment directly, bypassing the gateway.
pub async fn seed_payment(
    store: &MemoryStore,
    id: &str,
    order_id: &str,
    amount: i64,
    status: PaymentStatus,
) -> Payment {
    let now = Utc::now();
    let payment = Payment {
        id: id.to_string(),
        order_id: order_id.to_string(),
        transaction_id: order_id.to_string(),
        amount: Decimal::from(amount),
        method: PaymentMethod::Qris,
        status,
        payment_url: Some(format!("https://gateway.test/checkout/{order_id}")),
        created_at: now,
        updated_at: now,
        metadata: json!({"token": "tok-test"}),
    };
    store.save(&payment).await.unwrap();
    payment
}
