use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, VersionQuery},
    models::{OpenRepairSlip, RepairStatus},
    services::{
        repair_ledger::RepairProgress,
        repair_slips::{
            CreateRepairSlipRequest, ManualRepairItemRequest, RepairItemDetails, SlipAssignment,
        },
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressRequest {
    pub delta_repaired: u32,
    pub new_status: RepairStatus,
    pub notes: Option<String>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActualCostRequest {
    pub actual_cost: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteQuery {
    #[serde(default)]
    pub force: bool,
}

pub async fn create_repair_slip(
    State(state): State<AppState>,
    Json(payload): Json<CreateRepairSlipRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OpenRepairSlip>>), ServiceError> {
    let slip = state
        .services
        .repair_slips
        .create_from_condition_report(payload)
        .await?;
    Ok(created_response(slip))
}

pub async fn get_repair_slip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state.services.repair_slips.get_slip(id).await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn add_manual_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManualRepairItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OpenRepairSlip>>), ServiceError> {
    let slip = state
        .services
        .repair_slips
        .add_manual_item(id, payload)
        .await?;
    Ok(created_response(slip))
}

pub async fn record_progress(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<OpenRepairSlip> {
    let progress = RepairProgress {
        delta_repaired: payload.delta_repaired,
        new_status: payload.new_status,
        notes: payload.notes,
    };
    let slip = state
        .services
        .repair_slips
        .apply_item_update(id, item_id, progress, payload.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn update_item_details(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Query(version): Query<VersionQuery>,
    Json(payload): Json<RepairItemDetails>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state
        .services
        .repair_slips
        .update_item_details(id, item_id, payload, version.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SlipAssignment>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state
        .services
        .repair_slips
        .update_assignment(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn record_actual_cost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActualCostRequest>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state
        .services
        .repair_slips
        .record_actual_cost(id, payload.actual_cost)
        .await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn complete_repair_slip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CompleteQuery>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state
        .services
        .repair_slips
        .mark_complete(id, query.force)
        .await?;
    Ok(Json(ApiResponse::success(slip)))
}

pub async fn cancel_repair_slip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OpenRepairSlip> {
    let slip = state.services.repair_slips.cancel(id).await?;
    Ok(Json(ApiResponse::success(slip)))
}
