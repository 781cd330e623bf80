use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    errors::ServiceError,
    events::{Event, EventSender},
    integrations::{PriceCatalog, ReturnSource},
    models::{
        ConditionReport, Disposition, InspectedLineItem, InventoryAdjustment, ReferenceType,
        ReportMetadata, ReportStatus, SeedItem,
    },
    services::{
        cost_calculator::{self, validate_amount},
        ensure_version, ServiceSettings, SYSTEM_ACTOR,
    },
};

/// Line entered by hand instead of coming from a return request.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ManualInspectionItem {
    #[validate(length(min = 1, message = "Item reference cannot be empty"))]
    pub item_ref: String,
    #[validate(length(min = 1, message = "Item name cannot be empty"))]
    pub name: String,
    #[validate(range(min = 1))]
    pub quantity_returned: u32,
    /// Explicit price; wins over the catalog.
    #[validate(custom = "validate_amount")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateConditionReportRequest {
    pub return_request_id: Option<String>,
    #[validate(length(min = 1, message = "Customer name cannot be empty"))]
    pub customer_name: String,
    pub inspector: Option<String>,
    pub inspection_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// When empty, lines are taken from the return request.
    #[serde(default)]
    pub items: Vec<ManualInspectionItem>,
}

/// One line of a full item-list replace. Lines without an id are added.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct InspectionLineInput {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, message = "Item reference cannot be empty"))]
    pub item_ref: String,
    #[validate(length(min = 1, message = "Item name cannot be empty"))]
    pub name: String,
    /// Ignored for existing lines, which keep what was returned.
    pub quantity_returned: u32,
    pub quantity_good: u32,
    pub quantity_repair: u32,
    pub quantity_write_off: u32,
    #[validate(custom = "validate_amount")]
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
}

impl InspectionLineInput {
    fn disposition(&self) -> Disposition {
        Disposition::new(self.quantity_good, self.quantity_repair, self.quantity_write_off)
    }
}

/// Service for inspection of returned equipment
#[derive(Clone)]
pub struct ConditionReportService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    return_source: Arc<dyn ReturnSource>,
    price_catalog: Arc<dyn PriceCatalog>,
    settings: ServiceSettings,
}

impl ConditionReportService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        return_source: Arc<dyn ReturnSource>,
        price_catalog: Arc<dyn PriceCatalog>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            return_source,
            price_catalog,
            settings,
        }
    }

    /// Opens a report with every returned unit assumed good.
    ///
    /// Catalog prices are read once here and frozen on the lines.
    #[instrument(skip(self, request), fields(customer = %request.customer_name), err)]
    pub async fn create_report(
        &self,
        request: CreateConditionReportRequest,
    ) -> Result<ConditionReport, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let seeds = self.resolve_seeds(&request).await?;
        let now = Utc::now();
        let metadata = ReportMetadata {
            return_request_id: request.return_request_id,
            customer_name: request.customer_name,
            inspector: request.inspector,
            inspection_date: request.inspection_date.unwrap_or_else(|| now.date_naive()),
            notes: request.notes,
        };
        let prefix = self.settings.report_number_prefix.clone();

        let report = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let number = db::next_number(txn, &prefix, now.date_naive()).await?;
                let report = ConditionReport::create(number, metadata, seeds, now)?;
                db::insert_report(txn, report).await
            })
        })
        .await?;

        info!(
            report_number = %report.report_number,
            items = report.items.len(),
            total_items_inspected = report.totals.total_items_inspected,
            "Condition report created"
        );
        self.event_sender
            .publish(Event::ConditionReportCreated {
                report_id: report.id,
                report_number: report.report_number.clone(),
            })
            .await;
        Ok(report)
    }

    async fn resolve_seeds(
        &self,
        request: &CreateConditionReportRequest,
    ) -> Result<Vec<SeedItem>, ServiceError> {
        let mut seeds = Vec::new();

        if !request.items.is_empty() {
            for item in &request.items {
                let unit_price = match item.unit_price {
                    Some(price) => price,
                    None => self.catalog_price(&item.item_ref).await?,
                };
                seeds.push(SeedItem {
                    item_ref: item.item_ref.clone(),
                    name: item.name.clone(),
                    quantity_returned: item.quantity_returned,
                    unit_price,
                });
            }
            return Ok(seeds);
        }

        let return_request_id = request.return_request_id.as_deref().ok_or_else(|| {
            ServiceError::ValidationError(
                "Either a return request or manual items are required".to_string(),
            )
        })?;
        for returned in self.return_source.returned_items(return_request_id).await? {
            let unit_price = self.catalog_price(&returned.item_ref).await?;
            seeds.push(SeedItem {
                item_ref: returned.item_ref,
                name: returned.name,
                quantity_returned: returned.quantity_returned,
                unit_price,
            });
        }
        Ok(seeds)
    }

    /// Catalog price, rejected when it is outside the range costs are computed for.
    async fn catalog_price(&self, item_ref: &str) -> Result<Decimal, ServiceError> {
        let price = self.price_catalog.unit_price(item_ref).await?;
        cost_calculator::ensure_amount(item_ref, price)
    }

    #[instrument(skip(self), err)]
    pub async fn get_report(&self, report_id: Uuid) -> Result<ConditionReport, ServiceError> {
        db::find_report(self.db_pool.as_ref(), report_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_report_by_number(
        &self,
        report_number: String,
    ) -> Result<ConditionReport, ServiceError> {
        db::find_report_by_number(self.db_pool.as_ref(), &report_number).await
    }

    /// Sets the good/repair/write-off split of one line.
    #[instrument(skip(self), err)]
    pub async fn update_item_disposition(
        &self,
        report_id: Uuid,
        item_id: Uuid,
        disposition: Disposition,
        expected_version: Option<u64>,
    ) -> Result<ConditionReport, ServiceError> {
        let now = Utc::now();
        let report = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut report = db::find_report(txn, report_id).await?;
                ensure_version(report_id, expected_version, report.version)?;
                report.update_item_disposition(item_id, disposition, now)?;
                db::save_report(txn, report).await
            })
        })
        .await?;

        info!(
            report_number = %report.report_number,
            %item_id,
            good = disposition.good,
            repair = disposition.repair,
            write_off = disposition.write_off,
            "Disposition recorded"
        );
        Ok(report)
    }

    /// Replaces the whole item list in one step.
    #[instrument(skip(self, lines), fields(lines = lines.len()), err)]
    pub async fn replace_items(
        &self,
        report_id: Uuid,
        lines: Vec<InspectionLineInput>,
        expected_version: Option<u64>,
    ) -> Result<ConditionReport, ServiceError> {
        for line in &lines {
            line.validate()?;
        }

        // new lines without an explicit price are priced before the write lock is taken
        let mut prices = Vec::with_capacity(lines.len());
        for line in &lines {
            let price = match (line.id, line.unit_price) {
                (_, Some(price)) => Some(price),
                (None, None) => Some(self.catalog_price(&line.item_ref).await?),
                (Some(_), None) => None,
            };
            prices.push(price);
        }

        let now = Utc::now();
        let report = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut report = db::find_report(txn, report_id).await?;
                ensure_version(report_id, expected_version, report.version)?;

                let mut items = Vec::with_capacity(lines.len());
                for (line, price) in lines.into_iter().zip(prices) {
                    let disposition = line.disposition();
                    let mut item = match line.id {
                        Some(id) => report.item(id)?.clone(),
                        None => InspectedLineItem::seed(
                            line.item_ref,
                            line.name,
                            line.quantity_returned,
                            Decimal::ZERO,
                        ),
                    };
                    if let Some(price) = price {
                        item.set_unit_price(price)?;
                    }
                    item.quantity_good = disposition.good;
                    item.quantity_repair = disposition.repair;
                    item.quantity_write_off = disposition.write_off;
                    item.notes = line.notes;
                    items.push(item);
                }

                report.replace_items(items, now)?;
                db::save_report(txn, report).await
            })
        })
        .await?;

        info!(
            report_number = %report.report_number,
            items = report.items.len(),
            "Condition report items replaced"
        );
        Ok(report)
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        expected_version: Option<u64>,
    ) -> Result<ConditionReport, ServiceError> {
        let now = Utc::now();
        db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut report = db::find_report(txn, report_id).await?;
                ensure_version(report_id, expected_version, report.version)?;
                report.set_status(status, now)?;
                db::save_report(txn, report).await
            })
        })
        .await
    }

    /// Completes the inspection and logs every written-off quantity.
    #[instrument(skip(self), err)]
    pub async fn finalize(
        &self,
        report_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<ConditionReport, ServiceError> {
        let now = Utc::now();
        let adjustment_type = self.settings.write_off_policy.adjustment_type();

        let report = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut report = db::find_report(txn, report_id).await?;
                ensure_version(report_id, expected_version, report.version)?;
                report.finalize(now)?;

                let adjusted_by = report
                    .metadata
                    .inspector
                    .clone()
                    .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
                let adjustments = report
                    .written_off_items()
                    .map(|item| {
                        InventoryAdjustment::record(
                            adjustment_type,
                            ReferenceType::ConditionReport,
                            report.report_number.clone(),
                            item.item_ref.clone(),
                            item.quantity_write_off,
                            adjusted_by.clone(),
                            now,
                        )
                    })
                    .collect::<Vec<_>>();
                for adjustment in &adjustments {
                    db::append_adjustment(txn, adjustment).await?;
                }
                db::save_report(txn, report).await
            })
        })
        .await?;

        info!(
            report_number = %report.report_number,
            total_good = report.totals.total_good,
            total_repair = report.totals.total_repair,
            total_write_off = report.totals.total_write_off,
            total_repair_cost = %report.totals.total_repair_cost,
            write_off_policy = %self.settings.write_off_policy,
            "Condition report finalized"
        );
        self.event_sender
            .publish(Event::ConditionReportFinalized {
                report_id: report.id,
                report_number: report.report_number.clone(),
                total_repair: report.totals.total_repair,
                total_write_off: report.totals.total_write_off,
            })
            .await;
        Ok(report)
    }

    #[instrument(skip(self), err)]
    pub async fn archive(&self, report_id: Uuid) -> Result<ConditionReport, ServiceError> {
        let now = Utc::now();
        let report = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let mut report = db::find_report(txn, report_id).await?;
                report.archive(now)?;
                db::save_report(txn, report).await
            })
        })
        .await?;

        info!(report_number = %report.report_number, "Condition report archived");
        self.event_sender
            .publish(Event::ConditionReportArchived(report.id))
            .await;
        Ok(report)
    }

    /// Deletes a report. Slips created from it keep their copied data but lose
    /// the link, which the caller must acknowledge with `confirm_unlink`.
    ///
    /// Returns the ids of the slips that were unlinked.
    #[instrument(skip(self), err)]
    pub async fn delete_report(
        &self,
        report_id: Uuid,
        confirm_unlink: bool,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let now = Utc::now();
        let (report_number, unlinked) = db::transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let report = db::find_report(txn, report_id).await?;
                let slips = db::slips_for_report(txn, report_id).await?;
                if !slips.is_empty() && !confirm_unlink {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Condition report {} is referenced by {} repair slip(s); confirm unlinking to delete it",
                        report.report_number,
                        slips.len()
                    )));
                }

                let mut unlinked = Vec::with_capacity(slips.len());
                for mut slip in slips {
                    slip.condition_report_id = None;
                    slip.updated_at = now;
                    unlinked.push(db::save_slip(txn, slip).await?.id);
                }
                db::delete_report(txn, report_id).await?;
                Ok((report.report_number, unlinked))
            })
        })
        .await?;

        if unlinked.is_empty() {
            info!(report_number = %report_number, "Condition report deleted");
        } else {
            warn!(
                report_number = %report_number,
                unlinked_slips = unlinked.len(),
                "Condition report deleted; repair slips unlinked"
            );
        }
        self.event_sender
            .publish(Event::ConditionReportDeleted {
                report_id,
                report_number,
                unlinked_slips: unlinked.clone(),
            })
            .await;
        Ok(unlinked)
    }
}
