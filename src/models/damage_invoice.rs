use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

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
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Overdue)
                | (PaymentStatus::Overdue, PaymentStatus::Paid)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Billing artifact generated exactly once from a repair slip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub repair_slip_id: Uuid,
    pub repair_slip_number: String,
    pub condition_report_number: Option<String>,
    pub customer_name: String,
    pub items: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_status: PaymentStatus,
    pub issue_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl DamageInvoice {
    /// Payment transitions are the only mutation allowed after generation.
    pub fn transition_payment(
        &mut self,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatus, ServiceError> {
        let previous = self.payment_status;
        if !previous.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Invoice {} cannot move from {} to {}",
                self.invoice_number, previous, next
            )));
        }
        self.payment_status = next;
        if next == PaymentStatus::Paid {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
        Ok(previous)
    }

    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.payment_status == PaymentStatus::Pending && today > self.due_date
    }
}
