use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{errors::ServiceError, services::cost_calculator, services::quantity_ledger};

/// Condition tag derived from an inspected line's disposition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ItemCondition {
    Good,
    MajorDamage,
    BeyondRepair,
}

impl ItemCondition {
    pub fn derive(repair: u32, write_off: u32) -> Self {
        if write_off > 0 {
            ItemCondition::BeyondRepair
        } else if repair > 0 {
            ItemCondition::MajorDamage
        } else {
            ItemCondition::Good
        }
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Three-way split of an inspected quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Disposition {
    pub good: u32,
    pub repair: u32,
    pub write_off: u32,
}

impl Disposition {
    pub fn new(good: u32, repair: u32, write_off: u32) -> Self {
        Self {
            good,
            repair,
            write_off,
        }
    }

    /// Widened so that three large counts can never wrap.
    pub fn total(&self) -> u64 {
        u64::from(self.good) + u64::from(self.repair) + u64::from(self.write_off)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectedLineItem {
    pub id: Uuid,
    pub item_ref: String,
    pub name: String,
    pub quantity_returned: u32,
    pub quantity_good: u32,
    pub quantity_repair: u32,
    pub quantity_write_off: u32,
    /// Price frozen at inspection time; later catalog changes do not apply.
    pub unit_price: Decimal,
    pub estimated_repair_cost: Decimal,
    pub condition: ItemCondition,
    pub repair_required: bool,
    pub notes: Option<String>,
}

impl InspectedLineItem {
    /// Seeds a line with the whole returned quantity assumed good.
    pub fn seed(
        item_ref: impl Into<String>,
        name: impl Into<String>,
        quantity_returned: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_ref: item_ref.into(),
            name: name.into(),
            quantity_returned,
            quantity_good: quantity_returned,
            quantity_repair: 0,
            quantity_write_off: 0,
            unit_price,
            estimated_repair_cost: Decimal::ZERO,
            condition: ItemCondition::Good,
            repair_required: false,
            notes: None,
        }
    }

    pub fn disposition(&self) -> Disposition {
        Disposition::new(
            self.quantity_good,
            self.quantity_repair,
            self.quantity_write_off,
        )
    }

    pub fn is_fully_accounted(&self) -> bool {
        self.disposition().total() == u64::from(self.quantity_returned)
    }

    /// Units that leave the good pool: repairs plus write-offs.
    pub fn damaged_quantity(&self) -> u32 {
        self.quantity_repair + self.quantity_write_off
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) -> Result<(), ServiceError> {
        let estimated_repair_cost = cost_calculator::estimate_cost(
            unit_price,
            self.quantity_repair,
            self.quantity_write_off,
        )?;
        self.unit_price = unit_price;
        self.estimated_repair_cost = estimated_repair_cost;
        Ok(())
    }

    pub(crate) fn refresh_derived(&mut self) -> Result<(), ServiceError> {
        self.estimated_repair_cost = cost_calculator::estimate_cost(
            self.unit_price,
            self.quantity_repair,
            self.quantity_write_off,
        )?;
        self.condition = ItemCondition::derive(self.quantity_repair, self.quantity_write_off);
        self.repair_required = self.quantity_repair > 0 || self.quantity_write_off > 0;
        Ok(())
    }
}

/// Seed for one inspected line, from the return source or entered manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedItem {
    pub item_ref: String,
    pub name: String,
    pub quantity_returned: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub return_request_id: Option<String>,
    pub customer_name: String,
    pub inspector: Option<String>,
    pub inspection_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    /// Sum of returned quantities across all lines.
    pub total_items_inspected: u64,
    pub total_good: u64,
    pub total_repair: u64,
    pub total_write_off: u64,
    pub total_repair_cost: Decimal,
}

impl ReportTotals {
    pub fn from_items(items: &[InspectedLineItem]) -> Result<Self, ServiceError> {
        let mut totals = items.iter().fold(Self::default(), |mut acc, item| {
            acc.total_items_inspected += u64::from(item.quantity_returned);
            acc.total_good += u64::from(item.quantity_good);
            acc.total_repair += u64::from(item.quantity_repair);
            acc.total_write_off += u64::from(item.quantity_write_off);
            acc
        });
        totals.total_repair_cost =
            cost_calculator::sum_amounts(items.iter().map(|item| item.estimated_repair_cost))?;
        Ok(totals)
    }
}

/// One inspection event for a batch of returned equipment (RCF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub id: Uuid,
    pub report_number: String,
    #[serde(flatten)]
    pub metadata: ReportMetadata,
    pub items: Vec<InspectedLineItem>,
    #[serde(flatten)]
    pub totals: ReportTotals,
    pub status: ReportStatus,
    pub archived: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl ConditionReport {
    pub fn create(
        report_number: String,
        metadata: ReportMetadata,
        seeds: Vec<SeedItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        if seeds.is_empty() {
            return Err(ServiceError::ValidationError(
                "A condition report needs at least one item".to_string(),
            ));
        }

        let items = seeds
            .into_iter()
            .map(|seed| {
                InspectedLineItem::seed(
                    seed.item_ref,
                    seed.name,
                    seed.quantity_returned,
                    seed.unit_price,
                )
            })
            .collect::<Vec<_>>();

        let mut report = Self {
            id: Uuid::new_v4(),
            report_number,
            metadata,
            items,
            totals: ReportTotals::default(),
            status: ReportStatus::Pending,
            archived: false,
            finalized_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        report.recalculate_totals()?;
        Ok(report)
    }

    pub fn is_finalized(&self) -> bool {
        self.status == ReportStatus::Completed
    }

    pub fn item(&self, item_id: Uuid) -> Result<&InspectedLineItem, ServiceError> {
        self.items.iter().find(|item| item.id == item_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Item {} not found on condition report {}",
                item_id, self.report_number
            ))
        })
    }

    fn ensure_mutable(&self) -> Result<(), ServiceError> {
        if self.archived {
            return Err(ServiceError::InvalidStatus(format!(
                "Condition report {} is archived",
                self.report_number
            )));
        }
        if self.is_finalized() {
            return Err(ServiceError::InvalidStatus(format!(
                "Condition report {} is finalized",
                self.report_number
            )));
        }
        Ok(())
    }

    /// Applies a disposition to one line. A rejected update leaves the report untouched.
    pub fn update_item_disposition(
        &mut self,
        item_id: Uuid,
        disposition: Disposition,
        now: DateTime<Utc>,
    ) -> Result<&InspectedLineItem, ServiceError> {
        self.ensure_mutable()?;
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Item {} not found on condition report {}",
                    item_id, self.report_number
                ))
            })?;

        let updated = quantity_ledger::apply_disposition(&self.items[index], disposition)?;
        let mut items = self.items.clone();
        items[index] = updated;
        self.totals = ReportTotals::from_items(&items)?;
        self.items = items;
        self.updated_at = now;
        Ok(&self.items[index])
    }

    /// Full replace of the item list. Every line is checked before anything is written.
    ///
    /// Existing lines keep their returned quantity and may not be dropped or listed
    /// twice; lines with an unknown id are added as manual entries.
    pub fn replace_items(
        &mut self,
        items: Vec<InspectedLineItem>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.ensure_mutable()?;
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "A condition report needs at least one item".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(items.len());
        if let Some(duplicate) = items.iter().find(|item| !seen.insert(item.id)) {
            return Err(ServiceError::ValidationError(format!(
                "Item {} ({}) is listed more than once",
                duplicate.id, duplicate.item_ref
            )));
        }

        if let Some(missing) = self
            .items
            .iter()
            .find(|existing| !items.iter().any(|item| item.id == existing.id))
        {
            return Err(ServiceError::InvalidOperation(format!(
                "Item {} cannot be removed from condition report {}",
                missing.item_ref, self.report_number
            )));
        }

        let mut checked = Vec::with_capacity(items.len());
        for mut item in items {
            if let Some(existing) = self.items.iter().find(|existing| existing.id == item.id) {
                item.quantity_returned = existing.quantity_returned;
            }
            let disposition = item.disposition();
            checked.push(quantity_ledger::apply_disposition(&item, disposition)?);
        }

        self.totals = ReportTotals::from_items(&checked)?;
        self.items = checked;
        self.updated_at = now;
        Ok(())
    }

    /// Explicit status change driven by the inspector. Completion goes through `finalize`.
    pub fn set_status(&mut self, status: ReportStatus, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_mutable()?;
        if status == ReportStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "Condition report {} can only be completed by finalizing it",
                self.report_number
            )));
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Completes the inspection once every returned unit has a disposition.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.ensure_mutable()?;

        let incomplete = self
            .items
            .iter()
            .filter(|item| !item.is_fully_accounted())
            .map(|item| item.item_ref.clone())
            .collect::<Vec<_>>();
        if !incomplete.is_empty() {
            return Err(ServiceError::IncompleteInspection {
                report_number: self.report_number.clone(),
                items: incomplete,
            });
        }

        self.recalculate_totals()?;
        self.status = ReportStatus::Completed;
        self.finalized_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.archived {
            return Err(ServiceError::InvalidStatus(format!(
                "Condition report {} is already archived",
                self.report_number
            )));
        }
        self.archived = true;
        self.updated_at = now;
        Ok(())
    }

    /// Idempotent re-derivation of the aggregate totals.
    pub fn recalculate_totals(&mut self) -> Result<(), ServiceError> {
        self.totals = ReportTotals::from_items(&self.items)?;
        Ok(())
    }

    pub fn repair_required_items(&self) -> impl Iterator<Item = &InspectedLineItem> {
        self.items.iter().filter(|item| item.repair_required)
    }

    pub fn written_off_items(&self) -> impl Iterator<Item = &InspectedLineItem> {
        self.items.iter().filter(|item| item.quantity_write_off > 0)
    }
}
