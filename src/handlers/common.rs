use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::ApiResponse;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Optimistic concurrency token sent by clients that read the aggregate first.
#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub expected_version: Option<u64>,
}
