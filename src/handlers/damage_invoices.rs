use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::created_response,
    models::{DamageInvoice, PaymentStatus},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverdueQuery {
    /// Defaults to today (UTC)
    pub as_of: Option<NaiveDate>,
}

pub async fn generate_invoice(
    State(state): State<AppState>,
    Path(slip_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<DamageInvoice>>), ServiceError> {
    let invoice = state.services.damage_invoices.generate(slip_id).await?;
    Ok(created_response(invoice))
}

pub async fn get_invoice_for_slip(
    State(state): State<AppState>,
    Path(slip_id): Path<Uuid>,
) -> ApiResult<DamageInvoice> {
    let invoice = state
        .services
        .damage_invoices
        .invoice_for_slip(slip_id)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DamageInvoice> {
    let invoice = state.services.damage_invoices.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentStatusRequest>,
) -> ApiResult<DamageInvoice> {
    let invoice = state
        .services
        .damage_invoices
        .update_payment_status(id, payload.payment_status)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn mark_overdue(
    State(state): State<AppState>,
    Query(query): Query<OverdueQuery>,
) -> ApiResult<Vec<DamageInvoice>> {
    let today = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let invoices = state.services.damage_invoices.mark_overdue(today).await?;
    Ok(Json(ApiResponse::success(invoices)))
}
