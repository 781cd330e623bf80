// Pure domain rules
pub mod cost_calculator;
pub mod quantity_ledger;
pub mod repair_ledger;

// Aggregate services
pub mod condition_reports;
pub mod damage_invoices;
pub mod inventory_adjustments;
pub mod repair_slips;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{config::AppConfig, errors::ServiceError, models::AdjustmentType};

/// What happens to written-off units when an inspection is finalized.
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
pub enum WriteOffPolicy {
    /// Units go straight to scrap.
    Immediate,
    /// Units wait for a manager to confirm the write-off.
    #[default]
    RequiresReview,
}

impl WriteOffPolicy {
    pub fn adjustment_type(&self) -> AdjustmentType {
        match self {
            WriteOffPolicy::Immediate => AdjustmentType::Scrapped,
            WriteOffPolicy::RequiresReview => AdjustmentType::WriteOffPending,
        }
    }
}

/// Settings the services read from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub write_off_policy: WriteOffPolicy,
    pub report_number_prefix: String,
    pub slip_number_prefix: String,
    pub invoice_number_prefix: String,
    pub invoice_due_days: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            write_off_policy: config.write_off_policy,
            report_number_prefix: config.report_number_prefix.clone(),
            slip_number_prefix: config.slip_number_prefix.clone(),
            invoice_number_prefix: config.invoice_number_prefix.clone(),
            invoice_due_days: config.invoice_due_days,
        }
    }
}

/// Rejects an edit made from an outdated read of the aggregate.
pub(crate) fn ensure_version(
    id: Uuid,
    expected: Option<u64>,
    actual: u64,
) -> Result<(), ServiceError> {
    match expected {
        Some(expected) if expected != actual => Err(ServiceError::ConcurrentModification(id)),
        _ => Ok(()),
    }
}

/// Actor recorded on adjustments when no person is known.
pub(crate) const SYSTEM_ACTOR: &str = "system";
