use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        AdjustmentType, InventoryAdjustment, OpenRepairSlip, Priority, ReferenceType,
        RepairAction, RepairItem, SlipStatus,
    },
    services::{
        cost_calculator::{self, validate_amount},
        ensure_version,
        repair_ledger::{self, RepairProgress},
        ServiceSettings, SYSTEM_ACTOR,
    },
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateRepairSlipRequest {
    pub condition_report_id: Uuid,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Repair item added directly on a slip, with no inspected line behind it.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ManualRepairItemRequest {
    #[validate(length(min = 1, message = "Item reference cannot be empty"))]
    pub item_ref: String,
    #[validate(length(min = 1, message = "Item name cannot be empty"))]
    pub name: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(custom = "validate_amount")]
    pub cost_per_unit: Decimal,
    pub damage_type: Option<String>,
    pub damage_description: Option<String>,
    pub notes: Option<String>,
}

/// Refinement of a repair item. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct RepairItemDetails {
    #[validate(custom = "validate_amount")]
    pub cost_per_unit: Option<Decimal>,
    pub repair_actions: Option<Vec<RepairAction>>,
    pub damage_type: Option<String>,
    pub damage_description: Option<String>,
    pub before_images: Option<Vec<String>>,
    pub after_images: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Partial update of who works a slip and by when.
///
/// For `assigned_to` and `due_date` an absent field keeps the current value
/// and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SlipAssignment {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<Option<String>>,
    pub priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Marks a field that appeared in the payload, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Service for repair slips and the maintenance work recorded on them
#[derive(Clone)]
pub struct RepairSlipService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    settings: ServiceSettings,
}

impl RepairSlipService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    /// Opens a slip for the damaged lines of a finalized report.
    ///
    /// Lines already picked up by a live slip of the same report are skipped, so
    /// repeated calls never duplicate work.
    #[instrument(skip(self, request), fields(report_id = %request.condition_report_id), err)]
    pub async fn create_from_condition_report(
        &self,
        request: CreateRepairSlipRequest,
    ) -> Result<OpenRepairSlip, ServiceError> {
        let now = Utc::now();
        let prefix = self.settings.slip_number_prefix.clone();

        let slip = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let report = db::find_report(txn, request.condition_report_id).await?;
                if !report.is_finalized() {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Condition report {} must be finalized before repair work is raised",
                        report.report_number
                    )));
                }

                let live_slips = db::slips_for_report(txn, report.id)
                    .await?
                    .into_iter()
                    .filter(|slip| slip.status != SlipStatus::Cancelled)
                    .collect::<Vec<_>>();
                let items = report
                    .repair_required_items()
                    .filter(|line| !live_slips.iter().any(|slip| slip.sources(line.id)))
                    .map(RepairItem::from_inspected)
                    .collect::<Result<Vec<_>, _>>()?;
                if items.is_empty() {
                    return Err(ServiceError::ValidationError(format!(
                        "Condition report {} has no damaged items left to repair",
                        report.report_number
                    )));
                }

                let number = db::next_number(txn, &prefix, now.date_naive()).await?;
                let mut slip =
                    OpenRepairSlip::new(number, report.metadata.customer_name.clone(), items, now)?;
                slip.condition_report_id = Some(report.id);
                slip.condition_report_number = Some(report.report_number.clone());
                slip.priority = request.priority.unwrap_or_default();
                slip.assigned_to = request.assigned_to;
                slip.due_date = request.due_date;
                slip.notes = request.notes;

                for item in &slip.items {
                    record_damage_detected(txn, &slip, item, now).await?;
                }
                db::insert_slip(txn, slip).await
            })
        })
        .await?;

        info!(
            slip_number = %slip.slip_number,
            report_number = ?slip.condition_report_number,
            items = slip.items.len(),
            estimated_cost = %slip.estimated_cost,
            "Repair slip created"
        );
        self.event_sender
            .publish(Event::RepairSlipCreated {
                slip_id: slip.id,
                slip_number: slip.slip_number.clone(),
                report_number: slip.condition_report_number.clone(),
            })
            .await;
        Ok(slip)
    }

    #[instrument(skip(self), err)]
    pub async fn get_slip(&self, slip_id: Uuid) -> Result<OpenRepairSlip, ServiceError> {
        db::find_slip(self.db_pool.as_ref(), slip_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn slips_for_report(
        &self,
        report_id: Uuid,
    ) -> Result<Vec<OpenRepairSlip>, ServiceError> {
        db::slips_for_report(self.db_pool.as_ref(), report_id).await
    }

    /// Records maintenance progress on one item and re-derives the slip status.
    #[instrument(skip(self), err)]
    pub async fn apply_item_update(
        &self,
        slip_id: Uuid,
        item_id: Uuid,
        progress: RepairProgress,
        expected_version: Option<u64>,
    ) -> Result<OpenRepairSlip, ServiceError> {
        let now = Utc::now();
        let (slip, previous_status) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                ensure_version(slip_id, expected_version, slip.version)?;
                slip.ensure_active()?;

                let outcome = repair_ledger::record_progress(slip.item(item_id)?, &progress, now)?;
                let item_ref = outcome.item.item_ref.clone();
                *slip.item_mut(item_id)? = outcome.item;

                let previous_status = slip.status;
                slip.refresh(now)?;

                if let Some(resolution) = outcome.resolution {
                    let adjusted_by = slip
                        .assigned_to
                        .clone()
                        .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
                    let mut adjustment = InventoryAdjustment::record(
                        resolution.adjustment_type,
                        ReferenceType::RepairSlip,
                        slip.slip_number.clone(),
                        item_ref,
                        resolution.quantity,
                        adjusted_by,
                        now,
                    );
                    if let Some(notes) = &progress.notes {
                        adjustment = adjustment.with_notes(notes.clone());
                    }
                    db::append_adjustment(txn, &adjustment).await?;
                }

                Ok((db::save_slip(txn, slip).await?, previous_status))
            })
        })
        .await?;

        let item = slip.item(item_id)?;
        info!(
            slip_number = %slip.slip_number,
            item_ref = %item.item_ref,
            repair_status = %item.repair_status,
            quantity_repaired = item.quantity_repaired,
            quantity_remaining = item.quantity_remaining,
            "Repair progress recorded"
        );
        self.event_sender
            .publish(Event::RepairItemProgressed {
                slip_id,
                item_id,
                quantity_repaired: item.quantity_repaired,
                quantity_remaining: item.quantity_remaining,
            })
            .await;
        self.publish_status_change(&slip, previous_status).await;
        Ok(slip)
    }

    #[instrument(skip(self, request), fields(item_ref = %request.item_ref), err)]
    pub async fn add_manual_item(
        &self,
        slip_id: Uuid,
        request: ManualRepairItemRequest,
    ) -> Result<OpenRepairSlip, ServiceError> {
        request.validate()?;
        let now = Utc::now();

        let (slip, previous_status) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                slip.ensure_active()?;

                let mut item = RepairItem::manual(
                    request.item_ref,
                    request.name,
                    request.quantity,
                    request.cost_per_unit,
                )?;
                item.damage_type = request.damage_type;
                item.damage_description = request.damage_description;
                item.notes = request.notes;
                record_damage_detected(txn, &slip, &item, now).await?;

                slip.items.push(item);
                let previous_status = slip.status;
                slip.refresh(now)?;
                Ok((db::save_slip(txn, slip).await?, previous_status))
            })
        })
        .await?;

        info!(
            slip_number = %slip.slip_number,
            items = slip.items.len(),
            estimated_cost = %slip.estimated_cost,
            "Manual repair item added"
        );
        self.event_sender
            .publish(Event::RepairSlipUpdated(slip.id))
            .await;
        self.publish_status_change(&slip, previous_status).await;
        Ok(slip)
    }

    /// Refines costs, actions, damage notes and images of one item.
    #[instrument(skip(self, details), err)]
    pub async fn update_item_details(
        &self,
        slip_id: Uuid,
        item_id: Uuid,
        details: RepairItemDetails,
        expected_version: Option<u64>,
    ) -> Result<OpenRepairSlip, ServiceError> {
        details.validate()?;
        if let Some(actions) = &details.repair_actions {
            if let Some(action) = actions
                .iter()
                .find(|a| validate_amount(&a.unit_cost).is_err())
            {
                return Err(ServiceError::ValidationError(format!(
                    "Repair action '{}' must cost between 0 and {}",
                    action.label,
                    cost_calculator::MAX_UNIT_AMOUNT
                )));
            }
        }
        let now = Utc::now();

        let slip = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                ensure_version(slip_id, expected_version, slip.version)?;
                slip.ensure_active()?;

                let item = slip.item_mut(item_id)?;
                if let Some(actions) = details.repair_actions {
                    item.set_repair_actions(actions)?;
                }
                if let Some(cost_per_unit) = details.cost_per_unit {
                    item.set_cost_per_unit(cost_per_unit)?;
                }
                if details.damage_type.is_some() {
                    item.damage_type = details.damage_type;
                }
                if details.damage_description.is_some() {
                    item.damage_description = details.damage_description;
                }
                if let Some(images) = details.before_images {
                    item.before_images = images;
                }
                if let Some(images) = details.after_images {
                    item.after_images = images;
                }
                if details.notes.is_some() {
                    item.notes = details.notes;
                }

                slip.updated_at = now;
                slip.refresh(now)?;
                db::save_slip(txn, slip).await
            })
        })
        .await?;

        info!(
            slip_number = %slip.slip_number,
            %item_id,
            estimated_cost = %slip.estimated_cost,
            "Repair item updated"
        );
        self.event_sender
            .publish(Event::RepairSlipUpdated(slip.id))
            .await;
        Ok(slip)
    }

    #[instrument(skip(self), err)]
    pub async fn update_assignment(
        &self,
        slip_id: Uuid,
        assignment: SlipAssignment,
    ) -> Result<OpenRepairSlip, ServiceError> {
        let now = Utc::now();
        let slip = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                slip.ensure_active()?;
                if let Some(assigned_to) = assignment.assigned_to {
                    slip.assigned_to = assigned_to;
                }
                if let Some(priority) = assignment.priority {
                    slip.priority = priority;
                }
                if let Some(due_date) = assignment.due_date {
                    slip.due_date = due_date;
                }
                slip.updated_at = now;
                db::save_slip(txn, slip).await
            })
        })
        .await?;

        info!(
            slip_number = %slip.slip_number,
            assigned_to = ?slip.assigned_to,
            priority = %slip.priority,
            "Repair slip assignment updated"
        );
        self.event_sender
            .publish(Event::RepairSlipUpdated(slip.id))
            .await;
        Ok(slip)
    }

    /// Actual cost is usually known only once work is done, so completed slips accept it.
    #[instrument(skip(self), err)]
    pub async fn record_actual_cost(
        &self,
        slip_id: Uuid,
        actual_cost: Decimal,
    ) -> Result<OpenRepairSlip, ServiceError> {
        if validate_amount(&actual_cost).is_err() {
            return Err(ServiceError::ValidationError(format!(
                "Actual cost must be between 0 and {}",
                cost_calculator::MAX_UNIT_AMOUNT
            )));
        }
        let now = Utc::now();
        db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                if slip.status == SlipStatus::Cancelled {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Repair slip {} is cancelled",
                        slip.slip_number
                    )));
                }
                slip.actual_cost = Some(actual_cost);
                slip.updated_at = now;
                db::save_slip(txn, slip).await
            })
        })
        .await
    }

    /// Closes the slip. `force` closes it with items still outstanding.
    #[instrument(skip(self), err)]
    pub async fn mark_complete(
        &self,
        slip_id: Uuid,
        force: bool,
    ) -> Result<OpenRepairSlip, ServiceError> {
        let now = Utc::now();
        let (slip, previous_status, outstanding) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                let previous_status = slip.status;
                let outstanding = slip.mark_complete(force, now)?;
                Ok((db::save_slip(txn, slip).await?, previous_status, outstanding))
            })
        })
        .await?;

        if outstanding > 0 {
            warn!(
                slip_number = %slip.slip_number,
                outstanding_items = outstanding,
                "Repair slip force-completed with outstanding items"
            );
        } else {
            info!(slip_number = %slip.slip_number, "Repair slip completed");
        }
        self.publish_status_change(&slip, previous_status).await;
        Ok(slip)
    }

    #[instrument(skip(self), err)]
    pub async fn cancel(&self, slip_id: Uuid) -> Result<OpenRepairSlip, ServiceError> {
        let now = Utc::now();
        let (slip, previous_status) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                let previous_status = slip.status;
                slip.cancel(now)?;
                Ok((db::save_slip(txn, slip).await?, previous_status))
            })
        })
        .await?;

        info!(slip_number = %slip.slip_number, "Repair slip cancelled");
        self.publish_status_change(&slip, previous_status).await;
        Ok(slip)
    }

    async fn publish_status_change(&self, slip: &OpenRepairSlip, previous_status: SlipStatus) {
        if slip.status == previous_status {
            return;
        }
        info!(
            slip_number = %slip.slip_number,
            old_status = %previous_status,
            new_status = %slip.status,
            "Repair slip status changed"
        );
        self.event_sender
            .publish(Event::RepairSlipStatusChanged {
                slip_id: slip.id,
                old_status: previous_status.to_string(),
                new_status: slip.status.to_string(),
            })
            .await;
    }
}

/// Logs the units of an item that are headed for repair.
async fn record_damage_detected<C: ConnectionTrait>(
    conn: &C,
    slip: &OpenRepairSlip,
    item: &RepairItem,
    now: chrono::DateTime<Utc>,
) -> Result<(), ServiceError> {
    // write-off units were already logged when the inspection was finalized
    let to_repair = item.quantity.saturating_sub(item.quantity_write_off);
    if to_repair == 0 {
        return Ok(());
    }
    let adjusted_by = slip
        .assigned_to
        .clone()
        .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
    let adjustment = InventoryAdjustment::record(
        AdjustmentType::DamageDetected,
        ReferenceType::RepairSlip,
        slip.slip_number.clone(),
        item.item_ref.clone(),
        to_repair,
        adjusted_by,
        now,
    );
    db::append_adjustment(conn, &adjustment).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn assignment_distinguishes_absent_from_null() {
        let absent: SlipAssignment = serde_json::from_str(r#"{"priority": "high"}"#).unwrap();
        assert_eq!(absent.assigned_to, None);
        assert_eq!(absent.due_date, None);
        assert_eq!(absent.priority, Some(Priority::High));

        let cleared: SlipAssignment =
            serde_json::from_str(r#"{"assigned_to": null, "due_date": null}"#).unwrap();
        assert_eq!(cleared.assigned_to, Some(None));
        assert_eq!(cleared.due_date, Some(None));

        let set: SlipAssignment =
            serde_json::from_str(r#"{"assigned_to": "tech-7", "due_date": "2024-03-11"}"#)
                .unwrap();
        assert_eq!(set.assigned_to, Some(Some("tech-7".to_string())));
        assert_eq!(set.due_date, Some(NaiveDate::from_ymd_opt(2024, 3, 11)));
    }

    #[test]
    fn oversized_manual_cost_fails_validation() {
        let request = ManualRepairItemRequest {
            item_ref: "GEN-5KVA".into(),
            name: "Generator 5kVA".into(),
            quantity: 2,
            cost_per_unit: Decimal::MAX,
            damage_type: None,
            damage_description: None,
            notes: None,
        };
        assert_matches!(request.validate(), Err(_));
    }
}
