use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::integrations::{AdditionalCharge, AdditionalChargeSink};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes an event for a change that is already committed.
    ///
    /// The write cannot be undone at this point, so a closed channel is logged
    /// rather than reported to the caller.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!(error = %e, "dropping domain event");
        }
    }
}

/// Domain events emitted after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Condition report events
    ConditionReportCreated {
        report_id: Uuid,
        report_number: String,
    },
    ConditionReportFinalized {
        report_id: Uuid,
        report_number: String,
        total_repair: u64,
        total_write_off: u64,
    },
    ConditionReportArchived(Uuid),
    ConditionReportDeleted {
        report_id: Uuid,
        report_number: String,
        unlinked_slips: Vec<Uuid>,
    },

    // Repair slip events
    RepairSlipCreated {
        slip_id: Uuid,
        slip_number: String,
        report_number: Option<String>,
    },
    RepairSlipUpdated(Uuid),
    RepairItemProgressed {
        slip_id: Uuid,
        item_id: Uuid,
        quantity_repaired: u32,
        quantity_remaining: u32,
    },
    RepairSlipStatusChanged {
        slip_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Damage invoice events
    DamageInvoiceGenerated {
        invoice_id: Uuid,
        invoice_number: String,
        slip_id: Uuid,
        total: Decimal,
    },
    AdditionalChargeRequested(AdditionalCharge),
    InvoicePaymentStatusChanged {
        invoice_id: Uuid,
        old_status: String,
        new_status: String,
        timestamp: DateTime<Utc>,
    },
}

/// Drains the event channel, forwarding billing work to the charge sink.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    charge_sink: Arc<dyn AdditionalChargeSink>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        match event {
            Event::AdditionalChargeRequested(charge) => {
                if let Err(e) = charge_sink.create_additional_charge(&charge).await {
                    error!(
                        invoice_number = %charge.invoice_number,
                        slip_number = %charge.repair_slip_number,
                        error = %e,
                        "Failed to create additional charge"
                    );
                }
            }
            Event::ConditionReportFinalized {
                report_number,
                total_repair,
                total_write_off,
                ..
            } => {
                info!(
                    report_number = %report_number,
                    total_repair,
                    total_write_off,
                    "Condition report finalized"
                );
            }
            Event::RepairSlipStatusChanged {
                slip_id,
                old_status,
                new_status,
            } => {
                info!(%slip_id, %old_status, %new_status, "Repair slip status changed");
            }
            Event::DamageInvoiceGenerated {
                invoice_number,
                total,
                ..
            } => {
                info!(invoice_number = %invoice_number, total = %total, "Damage invoice generated");
            }
            Event::ConditionReportDeleted {
                report_number,
                unlinked_slips,
                ..
            } if !unlinked_slips.is_empty() => {
                warn!(
                    report_number = %report_number,
                    slips = unlinked_slips.len(),
                    "Condition report deleted while referenced by repair slips"
                );
            }
            other => {
                debug!("No specific handler for event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::MockAdditionalChargeSink;
    use rust_decimal_macros::dec;

    fn charge() -> AdditionalCharge {
        AdditionalCharge {
            invoice_id: Uuid::new_v4(),
            invoice_number: "DI-20240304-0001".into(),
            repair_slip_id: Uuid::new_v4(),
            repair_slip_number: "ORP-20240304-0001".into(),
            customer_name: "Harbor Events Ltd".into(),
            amount: dec!(127.20),
        }
    }

    #[tokio::test]
    async fn charge_requests_reach_the_sink() {
        let expected = charge();
        let mut sink = MockAdditionalChargeSink::new();
        let number = expected.invoice_number.clone();
        sink.expect_create_additional_charge()
            .withf(move |c| c.invoice_number == number)
            .times(1)
            .returning(|_| Ok(()));

        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender
            .send(Event::AdditionalChargeRequested(expected))
            .await
            .unwrap();
        sender
            .send(Event::ConditionReportArchived(Uuid::new_v4()))
            .await
            .unwrap();
        drop(sender);

        process_events(rx, Arc::new(sink)).await;
    }

    #[tokio::test]
    async fn publish_on_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::RepairSlipUpdated(Uuid::new_v4()))
            .await
            .is_err());
        sender.publish(Event::RepairSlipUpdated(Uuid::new_v4())).await;
    }
}
