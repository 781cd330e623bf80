use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AdjustmentType {
    DamageDetected,
    RepairCompleted,
    Scrapped,
    WriteOffPending,
}

/// Stock bucket a quantity moves between.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StockStatus {
    Returned,
    Damaged,
    Available,
    Scrapped,
    WriteOffPending,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReferenceType {
    ConditionReport,
    RepairSlip,
}

impl ReferenceType {
    /// Bucket the stock sits in before an adjustment raised from this document.
    fn origin(&self) -> StockStatus {
        match self {
            ReferenceType::ConditionReport => StockStatus::Returned,
            ReferenceType::RepairSlip => StockStatus::Damaged,
        }
    }
}

impl AdjustmentType {
    fn origin(&self, reference_type: ReferenceType) -> StockStatus {
        match self {
            // damage is always detected on freshly returned stock
            AdjustmentType::DamageDetected => StockStatus::Returned,
            _ => reference_type.origin(),
        }
    }

    fn destination(&self) -> StockStatus {
        match self {
            AdjustmentType::DamageDetected => StockStatus::Damaged,
            AdjustmentType::RepairCompleted => StockStatus::Available,
            AdjustmentType::Scrapped => StockStatus::Scrapped,
            AdjustmentType::WriteOffPending => StockStatus::WriteOffPending,
        }
    }
}

/// Append-only audit entry. `reference_id` is the human-readable RCF/ORP number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub id: Uuid,
    pub adjustment_type: AdjustmentType,
    pub item_ref: String,
    pub quantity: u32,
    pub from_status: StockStatus,
    pub to_status: StockStatus,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub adjusted_by: String,
    pub adjusted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl InventoryAdjustment {
    pub fn record(
        adjustment_type: AdjustmentType,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
        item_ref: impl Into<String>,
        quantity: u32,
        adjusted_by: impl Into<String>,
        adjusted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            adjustment_type,
            item_ref: item_ref.into(),
            quantity,
            from_status: adjustment_type.origin(reference_type),
            to_status: adjustment_type.destination(),
            reference_id: reference_id.into(),
            reference_type,
            adjusted_by: adjusted_by.into(),
            adjusted_at,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
