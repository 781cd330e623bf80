use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
    errors::ServiceError, models::condition_report::InspectedLineItem,
    services::cost_calculator,
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RepairStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Scrapped,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SlipStatus {
    #[default]
    Open,
    InRepair,
    Completed,
    Cancelled,
}

impl SlipStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlipStatus::Completed | SlipStatus::Cancelled)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A labelled piece of repair work with its own cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAction {
    pub label: String,
    pub quantity: u32,
    pub unit_cost: Decimal,
}

impl RepairAction {
    pub fn total(&self) -> Result<Decimal, ServiceError> {
        cost_calculator::line_total(self.quantity, self.unit_cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairItem {
    pub id: Uuid,
    /// Inspected line this item was copied from; `None` for manual entries.
    pub source_item_id: Option<Uuid>,
    pub item_ref: String,
    pub name: String,
    pub quantity: u32,
    pub quantity_write_off: u32,
    pub quantity_repaired: u32,
    pub quantity_remaining: u32,
    pub repair_status: RepairStatus,
    pub repair_actions: Vec<RepairAction>,
    pub damage_type: Option<String>,
    pub damage_description: Option<String>,
    pub cost_per_unit: Decimal,
    pub total_cost: Decimal,
    pub before_images: Vec<String>,
    pub after_images: Vec<String>,
    pub completed_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl RepairItem {
    /// Copies a repair-required inspected line, seeding the per-unit rate from its estimate.
    pub fn from_inspected(line: &InspectedLineItem) -> Result<Self, ServiceError> {
        let quantity = line.damaged_quantity();
        let mut item = Self::manual(
            line.item_ref.clone(),
            line.name.clone(),
            quantity,
            cost_calculator::per_unit_rate(line.estimated_repair_cost, quantity),
        )?;
        item.source_item_id = Some(line.id);
        item.quantity_write_off = line.quantity_write_off;
        item.damage_type = Some(line.condition.to_string());
        item.notes = line.notes.clone();
        Ok(item)
    }

    pub fn manual(
        item_ref: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        cost_per_unit: Decimal,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            id: Uuid::new_v4(),
            source_item_id: None,
            item_ref: item_ref.into(),
            name: name.into(),
            quantity,
            quantity_write_off: 0,
            quantity_repaired: 0,
            quantity_remaining: quantity,
            repair_status: RepairStatus::Pending,
            repair_actions: Vec::new(),
            damage_type: None,
            damage_description: None,
            cost_per_unit,
            total_cost: cost_calculator::line_total(quantity, cost_per_unit)?,
            before_images: Vec::new(),
            after_images: Vec::new(),
            completed_date: None,
            notes: None,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.quantity_remaining == 0
    }

    pub fn set_cost_per_unit(&mut self, cost_per_unit: Decimal) -> Result<(), ServiceError> {
        self.total_cost = cost_calculator::line_total(self.quantity, cost_per_unit)?;
        self.cost_per_unit = cost_per_unit;
        Ok(())
    }

    /// Replaces the action list; labels behave as a set.
    pub fn set_repair_actions(&mut self, actions: Vec<RepairAction>) -> Result<(), ServiceError> {
        for (index, action) in actions.iter().enumerate() {
            if action.label.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Repair action label cannot be empty".to_string(),
                ));
            }
            if actions[..index]
                .iter()
                .any(|other| other.label.eq_ignore_ascii_case(&action.label))
            {
                return Err(ServiceError::ValidationError(format!(
                    "Duplicate repair action '{}'",
                    action.label
                )));
            }
            action.total()?;
        }
        self.repair_actions = actions;
        Ok(())
    }
}

/// Repair slip (ORP) grouping the damaged items of one condition report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRepairSlip {
    pub id: Uuid,
    pub slip_number: String,
    pub condition_report_id: Option<Uuid>,
    pub condition_report_number: Option<String>,
    pub customer_name: String,
    pub items: Vec<RepairItem>,
    pub status: SlipStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub created_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub completed_date: Option<DateTime<Utc>>,
    pub estimated_cost: Decimal,
    pub actual_cost: Option<Decimal>,
    pub damage_invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl OpenRepairSlip {
    pub fn new(
        slip_number: String,
        customer_name: String,
        items: Vec<RepairItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        let mut slip = Self {
            id: Uuid::new_v4(),
            slip_number,
            condition_report_id: None,
            condition_report_number: None,
            customer_name,
            items,
            status: SlipStatus::Open,
            priority: Priority::default(),
            assigned_to: None,
            created_date: now,
            due_date: None,
            completed_date: None,
            estimated_cost: Decimal::ZERO,
            actual_cost: None,
            damage_invoice_id: None,
            notes: None,
            updated_at: now,
            version: 0,
        };
        slip.refresh(now)?;
        Ok(slip)
    }

    /// Status as a pure function of the items.
    ///
    /// A slip without items stays open rather than counting as vacuously complete.
    pub fn derive_status(items: &[RepairItem]) -> SlipStatus {
        if !items.is_empty() && items.iter().all(RepairItem::is_resolved) {
            SlipStatus::Completed
        } else if items
            .iter()
            .any(|item| item.repair_status == RepairStatus::InProgress)
        {
            SlipStatus::InRepair
        } else {
            SlipStatus::Open
        }
    }

    /// Re-derives cost and status; must run after every item mutation.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.estimated_cost =
            cost_calculator::sum_amounts(self.items.iter().map(|item| item.total_cost))?;
        if self.status.is_terminal() {
            return Ok(());
        }
        self.status = Self::derive_status(&self.items);
        if self.status == SlipStatus::Completed {
            self.completed_date = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Repair slip {} is {}",
                self.slip_number, self.status
            )));
        }
        Ok(())
    }

    pub fn item(&self, item_id: Uuid) -> Result<&RepairItem, ServiceError> {
        self.items.iter().find(|item| item.id == item_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Repair item {} not found on slip {}",
                item_id, self.slip_number
            ))
        })
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Result<&mut RepairItem, ServiceError> {
        let slip_number = self.slip_number.clone();
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Repair item {} not found on slip {}",
                    item_id, slip_number
                ))
            })
    }

    pub fn outstanding_items(&self) -> impl Iterator<Item = &RepairItem> {
        self.items.iter().filter(|item| !item.is_resolved())
    }

    pub fn sources(&self, source_item_id: Uuid) -> bool {
        self.items
            .iter()
            .any(|item| item.source_item_id == Some(source_item_id))
    }

    /// Terminal completion. Outstanding items block it unless `force` is set,
    /// which is the authorized override for closing a slip early.
    ///
    /// Returns the number of items that were still outstanding.
    pub fn mark_complete(&mut self, force: bool, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        self.ensure_active()?;
        let outstanding = self.outstanding_items().count();
        if outstanding > 0 && !force {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair slip {} still has {} outstanding item(s)",
                self.slip_number, outstanding
            )));
        }
        self.status = SlipStatus::Completed;
        self.completed_date = Some(now);
        self.updated_at = now;
        Ok(outstanding)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_active()?;
        self.status = SlipStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}
