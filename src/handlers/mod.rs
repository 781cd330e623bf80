pub mod common;
pub mod condition_reports;
pub mod damage_invoices;
pub mod inventory_adjustments;
pub mod repair_slips;

use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    integrations::{PriceCatalog, ReturnSource},
    services::{
        condition_reports::ConditionReportService, damage_invoices::DamageInvoiceService,
        inventory_adjustments::InventoryAdjustmentService, repair_slips::RepairSlipService,
        ServiceSettings,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub condition_reports: Arc<ConditionReportService>,
    pub repair_slips: Arc<RepairSlipService>,
    pub damage_invoices: Arc<DamageInvoiceService>,
    pub inventory_adjustments: Arc<InventoryAdjustmentService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        return_source: Arc<dyn ReturnSource>,
        price_catalog: Arc<dyn PriceCatalog>,
        settings: ServiceSettings,
    ) -> Self {
        let condition_reports = Arc::new(ConditionReportService::new(
            db_pool.clone(),
            event_sender.clone(),
            return_source,
            price_catalog,
            settings.clone(),
        ));
        let repair_slips = Arc::new(RepairSlipService::new(
            db_pool.clone(),
            event_sender.clone(),
            settings.clone(),
        ));
        let damage_invoices = Arc::new(DamageInvoiceService::new(
            db_pool.clone(),
            event_sender,
            settings,
        ));
        let inventory_adjustments = Arc::new(InventoryAdjustmentService::new(db_pool));

        Self {
            condition_reports,
            repair_slips,
            damage_invoices,
            inventory_adjustments,
        }
    }
}
