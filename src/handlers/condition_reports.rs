use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    handlers::common::{created_response, VersionQuery},
    models::{ConditionReport, Disposition, OpenRepairSlip, ReportStatus},
    services::condition_reports::{CreateConditionReportRequest, InspectionLineInput},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ReplaceItemsRequest {
    #[validate(length(min = 1, message = "A condition report needs at least one item"))]
    pub items: Vec<InspectionLineInput>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DispositionRequest {
    pub quantity_good: u32,
    pub quantity_repair: u32,
    pub quantity_write_off: u32,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReportStatusRequest {
    pub status: ReportStatus,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteReportQuery {
    #[serde(default)]
    pub confirm_unlink: bool,
}

pub async fn create_condition_report(
    State(state): State<AppState>,
    Json(payload): Json<CreateConditionReportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConditionReport>>), crate::errors::ServiceError> {
    let report = state
        .services
        .condition_reports
        .create_report(payload)
        .await?;
    Ok(created_response(report))
}

pub async fn get_condition_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ConditionReport> {
    let report = state.services.condition_reports.get_report(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn get_condition_report_by_number(
    State(state): State<AppState>,
    Path(report_number): Path<String>,
) -> ApiResult<ConditionReport> {
    let report = state
        .services
        .condition_reports
        .get_report_by_number(report_number)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn list_repair_slips_for_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OpenRepairSlip>> {
    // 404 for an unknown report rather than an empty list
    state.services.condition_reports.get_report(id).await?;
    let slips = state.services.repair_slips.slips_for_report(id).await?;
    Ok(Json(ApiResponse::success(slips)))
}

pub async fn replace_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> ApiResult<ConditionReport> {
    payload.validate()?;
    let report = state
        .services
        .condition_reports
        .replace_items(id, payload.items, payload.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn update_item_disposition(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DispositionRequest>,
) -> ApiResult<ConditionReport> {
    let disposition = Disposition::new(
        payload.quantity_good,
        payload.quantity_repair,
        payload.quantity_write_off,
    );
    let report = state
        .services
        .condition_reports
        .update_item_disposition(id, item_id, disposition, payload.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportStatusRequest>,
) -> ApiResult<ConditionReport> {
    let report = state
        .services
        .condition_reports
        .set_status(id, payload.status, payload.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(version): Query<VersionQuery>,
) -> ApiResult<ConditionReport> {
    let report = state
        .services
        .condition_reports
        .finalize(id, version.expected_version)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ConditionReport> {
    let report = state.services.condition_reports.archive(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn delete_condition_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteReportQuery>,
) -> ApiResult<serde_json::Value> {
    let unlinked = state
        .services
        .condition_reports
        .delete_report(id, query.confirm_unlink)
        .await?;
    Ok(Json(ApiResponse::success(json!({
        "report_id": id,
        "deleted": true,
        "unlinked_repair_slips": unlinked,
    }))))
}
