use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Machine-readable error code (e.g., "quantity_exceeded")
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(
        "Quantity exceeded for {item_ref}: {requested} units dispositioned but only {returned} returned"
    )]
    QuantityExceeded {
        item_ref: String,
        requested: u64,
        returned: u32,
    },

    #[error("Incomplete inspection on {report_number}: unaccounted quantity on {}", .items.join(", "))]
    IncompleteInspection {
        report_number: String,
        items: Vec<String>,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Damage invoice {invoice_id} already generated for repair slip {slip_number}")]
    AlreadyInvoiced { slip_number: String, invoice_id: Uuid },

    #[error("Nothing billable on repair slip {0}")]
    NoCost(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::QuantityExceeded { .. }
            | Self::IncompleteInspection { .. }
            | Self::InvalidQuantity(_)
            | Self::NoCost(_)
            | Self::AmountOutOfRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AlreadyInvoiced { .. }
            | Self::InvalidStatus(_)
            | Self::ConcurrentModification(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, used by clients to branch on business rejections.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuantityExceeded { .. } => "quantity_exceeded",
            Self::IncompleteInspection { .. } => "incomplete_inspection",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::AlreadyInvoiced { .. } => "already_invoiced",
            Self::NoCost(_) => "no_cost",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InvalidStatus(_) => "invalid_status",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::AmountOutOfRange(_) => "amount_out_of_range",
            Self::DatabaseError(_) => "database_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::AlreadyInvoiced {
                slip_number,
                invoice_id,
            } => format!(
                "Damage invoice already generated for {}; view existing invoice {}",
                slip_number, invoice_id
            ),
            Self::ConcurrentModification(id) => {
                format!("Concurrent modification for ID {}", id)
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
