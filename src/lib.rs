//! Equipment Inspection Library
//!
//! Inspection, repair tracking and damage invoicing for returned rental
//! equipment, exposed as an HTTP/JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod integrations;
pub mod migrator;
pub mod models;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    events::{Event, EventSender},
    integrations::{PriceCatalog, ReturnSource},
    services::ServiceSettings,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Connects the database, then wires the event channel and services. The
    /// receiver must be handed to [`events::process_events`] or drained by the caller.
    pub async fn new(
        config: config::AppConfig,
        return_source: Arc<dyn ReturnSource>,
        price_catalog: Arc<dyn PriceCatalog>,
    ) -> Result<(Self, mpsc::Receiver<Event>), errors::ServiceError> {
        let db = Arc::new(db::connect(&config).await?);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let services = handlers::AppServices::new(
            db.clone(),
            Arc::new(EventSender::new(event_tx)),
            return_source,
            price_catalog,
            ServiceSettings::from(&config),
        );

        Ok((
            Self {
                db,
                config,
                services,
            },
            event_rx,
        ))
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let condition_reports = Router::new()
        .route(
            "/condition-reports",
            post(handlers::condition_reports::create_condition_report),
        )
        .route(
            "/condition-reports/:id",
            get(handlers::condition_reports::get_condition_report)
                .delete(handlers::condition_reports::delete_condition_report),
        )
        .route(
            "/condition-reports/by-number/:report_number",
            get(handlers::condition_reports::get_condition_report_by_number),
        )
        .route(
            "/condition-reports/:id/items",
            put(handlers::condition_reports::replace_items),
        )
        .route(
            "/condition-reports/:id/items/:item_id/disposition",
            put(handlers::condition_reports::update_item_disposition),
        )
        .route(
            "/condition-reports/:id/status",
            put(handlers::condition_reports::set_status),
        )
        .route(
            "/condition-reports/:id/finalize",
            post(handlers::condition_reports::finalize),
        )
        .route(
            "/condition-reports/:id/archive",
            post(handlers::condition_reports::archive),
        )
        .route(
            "/condition-reports/:id/repair-slips",
            get(handlers::condition_reports::list_repair_slips_for_report),
        );

    let repair_slips = Router::new()
        .route(
            "/repair-slips",
            post(handlers::repair_slips::create_repair_slip),
        )
        .route(
            "/repair-slips/:id",
            get(handlers::repair_slips::get_repair_slip),
        )
        .route(
            "/repair-slips/:id/items",
            post(handlers::repair_slips::add_manual_item),
        )
        .route(
            "/repair-slips/:id/items/:item_id",
            put(handlers::repair_slips::update_item_details),
        )
        .route(
            "/repair-slips/:id/items/:item_id/progress",
            put(handlers::repair_slips::record_progress),
        )
        .route(
            "/repair-slips/:id/assignment",
            put(handlers::repair_slips::update_assignment),
        )
        .route(
            "/repair-slips/:id/actual-cost",
            put(handlers::repair_slips::record_actual_cost),
        )
        .route(
            "/repair-slips/:id/complete",
            post(handlers::repair_slips::complete_repair_slip),
        )
        .route(
            "/repair-slips/:id/cancel",
            post(handlers::repair_slips::cancel_repair_slip),
        );

    let damage_invoices = Router::new()
        .route(
            "/repair-slips/:id/invoice",
            post(handlers::damage_invoices::generate_invoice)
                .get(handlers::damage_invoices::get_invoice_for_slip),
        )
        .route(
            "/damage-invoices/mark-overdue",
            post(handlers::damage_invoices::mark_overdue),
        )
        .route(
            "/damage-invoices/:id",
            get(handlers::damage_invoices::get_invoice),
        )
        .route(
            "/damage-invoices/:id/payment-status",
            put(handlers::damage_invoices::update_payment_status),
        );

    let inventory_adjustments = Router::new().route(
        "/inventory-adjustments",
        get(handlers::inventory_adjustments::list_adjustments),
    );

    Router::new()
        .merge(condition_reports)
        .merge(repair_slips)
        .merge(damage_invoices)
        .merge(inventory_adjustments)
}

/// Full application router: health check plus the versioned API, with HTTP tracing.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "health check could not reach the database");
            "unavailable"
        }
    };
    let health_data = json!({
        "status": if database == "connected" { "healthy" } else { "degraded" },
        "database": database,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
