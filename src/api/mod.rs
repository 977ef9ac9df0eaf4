//! HTTP surface: thin request/response mapping over the reconciliation
//! service.

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::service::PaymentService;
use crate::webhook::WebhookProcessor;

pub mod health;
pub mod payments;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService>,
    pub webhook: Arc<WebhookProcessor>,
    pub pool: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments", post(payments::create_payment))
        .route("/payments/webhook", post(payments::handle_webhook))
        .route("/payments/order/:order_id", get(payments::list_by_order))
        .route("/payments/:payment_id", get(payments::get_payment))
        .route(
            "/payments/:payment_id/status",
            get(payments::check_status).put(payments::override_status),
        )
        .route("/payments/:payment_id/cancel", post(payments::cancel_payment))
        .route("/payments/:payment_id/refund", post(payments::refund_payment))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
