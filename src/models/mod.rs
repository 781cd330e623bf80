pub mod condition_report;
pub mod damage_invoice;
pub mod inventory_adjustment;
pub mod repair_slip;

pub use condition_report::{
    ConditionReport, Disposition, InspectedLineItem, ItemCondition, ReportMetadata, ReportStatus,
    ReportTotals, SeedItem,
};
pub use damage_invoice::{DamageInvoice, InvoiceLine, PaymentStatus};
pub use inventory_adjustment::{AdjustmentType, InventoryAdjustment, ReferenceType, StockStatus};
pub use repair_slip::{OpenRepairSlip, Priority, RepairAction, RepairItem, RepairStatus, SlipStatus};
