use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::{models::InventoryAdjustment, ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct AdjustmentListQuery {
    /// RCF or ORP number
    pub reference_id: Option<String>,
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    Query(query): Query<AdjustmentListQuery>,
) -> ApiResult<Vec<InventoryAdjustment>> {
    let adjustments = state
        .services
        .inventory_adjustments
        .list(query.reference_id)
        .await?;
    Ok(Json(ApiResponse::success(adjustments)))
}
