use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    db::{self, DbPool},
    errors::ServiceError,
    models::InventoryAdjustment,
};

/// Read and append access to the stock movement log.
///
/// Entries raised by inspections and repairs are written by those services in
/// the same transaction as the change that caused them.
#[derive(Clone)]
pub struct InventoryAdjustmentService {
    db_pool: Arc<DbPool>,
}

impl InventoryAdjustmentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, adjustment), fields(reference_id = %adjustment.reference_id), err)]
    pub async fn append(
        &self,
        adjustment: InventoryAdjustment,
    ) -> Result<InventoryAdjustment, ServiceError> {
        if adjustment.quantity == 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "Adjustment for {} must move at least one unit",
                adjustment.item_ref
            )));
        }
        db::append_adjustment(self.db_pool.as_ref(), &adjustment).await?;

        info!(
            adjustment_type = %adjustment.adjustment_type,
            item_ref = %adjustment.item_ref,
            quantity = adjustment.quantity,
            "Inventory adjustment recorded"
        );
        Ok(adjustment)
    }

    /// Entries in append order, optionally for one RCF/ORP number.
    #[instrument(skip(self), err)]
    pub async fn list(
        &self,
        reference_id: Option<String>,
    ) -> Result<Vec<InventoryAdjustment>, ServiceError> {
        db::adjustments(self.db_pool.as_ref(), reference_id.as_deref()).await
    }
}
