use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    errors::ServiceError,
    events::{Event, EventSender},
    integrations::AdditionalCharge,
    models::{DamageInvoice, InvoiceLine, OpenRepairSlip, PaymentStatus, SlipStatus},
    services::{cost_calculator, ServiceSettings},
};

/// Billable lines for a slip, in item order.
///
/// Every costed repair action becomes a line, then every written-off quantity.
/// Only when the whole slip produced none of those does each costed item fall
/// back to a single line for its total cost.
pub fn build_invoice_lines(slip: &OpenRepairSlip) -> Result<Vec<InvoiceLine>, ServiceError> {
    let mut lines = Vec::new();

    for item in &slip.items {
        for action in &item.repair_actions {
            let total = action.total()?;
            if total.is_zero() {
                continue;
            }
            lines.push(InvoiceLine {
                description: format!("{}: {}", action.label, item.name),
                quantity: action.quantity,
                unit_price: action.unit_cost,
                total,
            });
        }

        if item.quantity_write_off > 0 {
            let total = cost_calculator::line_total(item.quantity_write_off, item.cost_per_unit)?;
            if !total.is_zero() {
                lines.push(InvoiceLine {
                    description: format!("Write-off: {}", item.name),
                    quantity: item.quantity_write_off,
                    unit_price: item.cost_per_unit,
                    total,
                });
            }
        }
    }

    if lines.is_empty() {
        lines.extend(
            slip.items
                .iter()
                .filter(|item| !item.total_cost.is_zero())
                .map(|item| InvoiceLine {
                    description: format!("Repair: {}", item.name),
                    quantity: item.quantity,
                    unit_price: item.cost_per_unit,
                    total: item.total_cost,
                }),
        );
    }

    Ok(lines)
}

/// Money summary of an invoice. Tax is rounded to cents before it is added,
/// so `total` is always exactly `subtotal + tax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl InvoiceAmounts {
    pub fn from_lines(lines: &[InvoiceLine]) -> Result<Self, ServiceError> {
        let subtotal = cost_calculator::sum_amounts(lines.iter().map(|line| line.total))?;
        let tax = cost_calculator::invoice_tax(subtotal)?;
        let total = cost_calculator::sum_amounts([subtotal, tax])?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

/// Service for damage invoices raised from repair slips
#[derive(Clone)]
pub struct DamageInvoiceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    settings: ServiceSettings,
}

impl DamageInvoiceService {
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

    /// Generates the one invoice a slip may ever have.
    ///
    /// The invoice and the slip's back-reference are written in the same
    /// transaction, so a second call always sees the first invoice.
    #[instrument(skip(self), err)]
    pub async fn generate(&self, slip_id: Uuid) -> Result<DamageInvoice, ServiceError> {
        let now = Utc::now();
        let prefix = self.settings.invoice_number_prefix.clone();
        let due_days = i64::from(self.settings.invoice_due_days);

        let invoice = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut slip = db::find_slip(txn, slip_id).await?;
                if let Some(invoice_id) = slip.damage_invoice_id {
                    return Err(ServiceError::AlreadyInvoiced {
                        slip_number: slip.slip_number,
                        invoice_id,
                    });
                }
                if slip.status == SlipStatus::Cancelled {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Repair slip {} is cancelled and cannot be invoiced",
                        slip.slip_number
                    )));
                }

                let items = build_invoice_lines(&slip)?;
                if items.is_empty() {
                    return Err(ServiceError::NoCost(slip.slip_number));
                }
                let InvoiceAmounts {
                    subtotal,
                    tax,
                    total,
                } = InvoiceAmounts::from_lines(&items)?;

                let invoice = DamageInvoice {
                    id: Uuid::new_v4(),
                    invoice_number: db::next_number(txn, &prefix, now.date_naive()).await?,
                    repair_slip_id: slip.id,
                    repair_slip_number: slip.slip_number.clone(),
                    condition_report_number: slip.condition_report_number.clone(),
                    customer_name: slip.customer_name.clone(),
                    items,
                    subtotal,
                    tax,
                    total,
                    payment_status: PaymentStatus::Pending,
                    issue_date: now,
                    due_date: now.date_naive() + Duration::days(due_days),
                    paid_at: None,
                    updated_at: now,
                    version: 0,
                };
                let invoice = db::insert_invoice(txn, invoice).await?;

                slip.damage_invoice_id = Some(invoice.id);
                slip.updated_at = now;
                db::save_slip(txn, slip).await?;
                Ok(invoice)
            })
        })
        .await?;

        info!(
            invoice_number = %invoice.invoice_number,
            slip_number = %invoice.repair_slip_number,
            lines = invoice.items.len(),
            subtotal = %invoice.subtotal,
            tax = %invoice.tax,
            total = %invoice.total,
            "Damage invoice generated"
        );
        self.event_sender
            .publish(Event::DamageInvoiceGenerated {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                slip_id,
                total: invoice.total,
            })
            .await;
        self.event_sender
            .publish(Event::AdditionalChargeRequested(AdditionalCharge {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                repair_slip_id: invoice.repair_slip_id,
                repair_slip_number: invoice.repair_slip_number.clone(),
                customer_name: invoice.customer_name.clone(),
                amount: invoice.total,
            }))
            .await;
        Ok(invoice)
    }

    #[instrument(skip(self), err)]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<DamageInvoice, ServiceError> {
        db::find_invoice(self.db_pool.as_ref(), invoice_id).await
    }

    /// Reverse lookup from a slip to its invoice.
    #[instrument(skip(self), err)]
    pub async fn invoice_for_slip(&self, slip_id: Uuid) -> Result<DamageInvoice, ServiceError> {
        let conn = self.db_pool.as_ref();
        let slip = db::find_slip(conn, slip_id).await?;
        db::invoice_for_slip(conn, slip_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "No damage invoice for repair slip {}",
                slip.slip_number
            ))
        })
    }

    #[instrument(skip(self), err)]
    pub async fn update_payment_status(
        &self,
        invoice_id: Uuid,
        next: PaymentStatus,
    ) -> Result<DamageInvoice, ServiceError> {
        let now = Utc::now();
        let (invoice, previous) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut invoice = db::find_invoice(txn, invoice_id).await?;
                let previous = invoice.transition_payment(next, now)?;
                Ok((db::save_invoice(txn, invoice).await?, previous))
            })
        })
        .await?;

        info!(
            invoice_number = %invoice.invoice_number,
            old_status = %previous,
            new_status = %invoice.payment_status,
            "Invoice payment status changed"
        );
        self.event_sender
            .publish(Event::InvoicePaymentStatusChanged {
                invoice_id,
                old_status: previous.to_string(),
                new_status: invoice.payment_status.to_string(),
                timestamp: now,
            })
            .await;
        Ok(invoice)
    }

    /// Moves every pending invoice past its due date to overdue.
    #[instrument(skip(self), err)]
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<Vec<DamageInvoice>, ServiceError> {
        let now = Utc::now();
        let updated = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut updated = Vec::new();
                for mut invoice in db::pending_invoices_due_before(txn, today).await? {
                    if !invoice.is_past_due(today) {
                        continue;
                    }
                    invoice.transition_payment(PaymentStatus::Overdue, now)?;
                    updated.push(db::save_invoice(txn, invoice).await?);
                }
                Ok(updated)
            })
        })
        .await?;

        for invoice in &updated {
            self.event_sender
                .publish(Event::InvoicePaymentStatusChanged {
                    invoice_id: invoice.id,
                    old_status: PaymentStatus::Pending.to_string(),
                    new_status: PaymentStatus::Overdue.to_string(),
                    timestamp: now,
                })
                .await;
        }
        info!(count = updated.len(), %today, "Overdue damage invoices marked");
        Ok(updated)
    }
}
