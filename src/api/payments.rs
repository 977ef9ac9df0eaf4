//! Payment endpoint handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::api::AppState;
use crate::domain::payment::{
    CancelPayment, CreatePayment, Payment, PaymentMethod, PaymentStatus, RefundPayment,
};
use crate::error::{AppError, AppResult};
use crate::service::NotificationOutcome;

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePayment>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    info!(order_id = %request.order_id, "create payment requested");
    let payment = state.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> AppResult<Json<Payment>> {
    let payment = state.service.get(&payment_id).await?;
    Ok(Json(payment))
}

/// Structured force-check response: the gateway-reported status alongside
/// the stored record's key fields.
#[derive(Debug, Serialize)]
pub struct StatusCheckResponse {
    pub payment_id: String,
    pub order_id: String,
    pub current_status: PaymentStatus,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub last_updated: DateTime<Utc>,
}

pub async fn check_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> AppResult<Json<StatusCheckResponse>> {
    let current_status = state.service.check_status(&payment_id).await?;
    // Re-read after the check so the response reflects any persisted update.
    let payment = state.service.get(&payment_id).await?;

    Ok(Json(StatusCheckResponse {
        payment_id: payment.id,
        order_id: payment.order_id,
        current_status,
        amount: payment.amount,
        payment_method: payment.method,
        last_updated: payment.updated_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusOverride {
    pub status: String,
}

pub async fn override_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(body): Json<StatusOverride>,
) -> AppResult<Json<Payment>> {
    let status: PaymentStatus = body
        .status
        .parse()
        .map_err(AppError::Validation)?;
    let payment = state.service.override_status(&payment_id, status).await?;
    Ok(Json(payment))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: Option<Json<CancelPayment>>,
) -> AppResult<Json<Payment>> {
    let reason = body.as_ref().and_then(|b| b.reason.as_deref());
    let payment = state.service.cancel(&payment_id, reason).await?;
    Ok(Json(payment))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: Option<Json<RefundPayment>>,
) -> AppResult<Json<Payment>> {
    let (amount, reason) = match &body {
        Some(Json(request)) => (request.amount, request.reason.as_deref()),
        None => (None, None),
    };
    let payment = state.service.refund(&payment_id, amount, reason).await?;
    Ok(Json(payment))
}

pub async fn list_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.service.list_by_order(&order_id).await?;
    Ok(Json(payments))
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<NotificationOutcome>> {
    let outcome = state.webhook.process(&payload, true).await?;
    Ok(Json(outcome))
}
