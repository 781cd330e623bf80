/*!
 * Aggregate Store
 *
 * SeaORM persistence for condition reports, repair slips, damage invoices and
 * the inventory adjustment log. Each aggregate is stored whole as a JSON
 * document with its ordered item list; the columns beside it carry what is
 * looked up or constrained (numbers, link ids, payment status, version).
 *
 * Writes go through [`transaction`]. Every save is a compare-and-swap on the
 * aggregate version, so a document read before a concurrent commit cannot
 * overwrite the newer row.
 */

use chrono::NaiveDate;
use futures::future::BoxFuture;
use sea_orm::{
    sea_query::Expr, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, ConnectOptions,
    ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, TransactionError, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{
        condition_report, damage_invoice, document_sequence, inventory_adjustment, repair_slip,
    },
    errors::ServiceError,
    migrator::Migrator,
    models::{ConditionReport, DamageInvoice, InventoryAdjustment, OpenRepairSlip, PaymentStatus},
};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Lifetime for the connection that holds an in-memory database.
const IN_MEMORY_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Establishes a connection pool to the database.
///
/// An in-memory SQLite database exists per connection, so its pool is pinned
/// to one connection that is never recycled.
pub async fn establish_connection(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut max_connections = config.max_connections;
    if config.is_in_memory() && max_connections != 1 {
        warn!(
            requested = max_connections,
            "In-memory database uses a single connection"
        );
        max_connections = 1;
    }

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);
    if config.is_in_memory() {
        opt.idle_timeout(IN_MEMORY_LIFETIME)
            .max_lifetime(IN_MEMORY_LIFETIME);
    }

    info!(max_connections, "Connecting to database");
    let pool = Database::connect(opt).await?;
    info!("Database connection pool established successfully");
    Ok(pool)
}

/// Runs database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    Migrator::up(pool, None).await.map_err(|e| {
        error!("Database migrations failed: {}", e);
        ServiceError::DatabaseError(e)
    })
}

/// Connects with the application settings and migrates when `auto_migrate` is set.
pub async fn connect(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let pool = establish_connection(&DbConfig::from(cfg)).await?;
    if cfg.auto_migrate {
        run_migrations(&pool).await?;
    }
    Ok(pool)
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(ServiceError::DatabaseError)
}

/// Runs `f` in one database transaction, committed only when it returns `Ok`.
pub async fn transaction<F, T>(db: &DbPool, f: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    debug!(%transaction_id, "Starting database transaction");

    let result = db
        .transaction::<_, T, ServiceError>(f)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        });

    match &result {
        Ok(_) => debug!(%transaction_id, "Transaction committed"),
        Err(e) => debug!(%transaction_id, error = %e, "Transaction rolled back"),
    }
    result
}

/// Versioned aggregate root stored as one document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Document for ConditionReport {
    const KIND: &'static str = "Condition report";

    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for OpenRepairSlip {
    const KIND: &'static str = "Repair slip";

    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for DamageInvoice {
    const KIND: &'static str = "Damage invoice";

    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

fn db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn encode<T: Serialize>(doc: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(doc)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode document: {}", e)))
}

fn decode<T: Document>(document: serde_json::Value, version: i64) -> Result<T, ServiceError> {
    let mut doc: T = serde_json::from_value(document).map_err(|e| {
        ServiceError::InternalError(format!("Failed to decode {}: {}", T::KIND, e))
    })?;
    doc.set_version(u64::try_from(version).unwrap_or_default());
    Ok(doc)
}

fn not_found<T: Document>(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("{} {} not found", T::KIND, id))
}

/// Outcome of a compare-and-swap that matched no row.
fn stale_or_missing<T: Document>(id: Uuid, exists: bool) -> ServiceError {
    if exists {
        ServiceError::ConcurrentModification(id)
    } else {
        not_found::<T>(id)
    }
}

/// Next human-readable document number, e.g. `RCF-20240304-0007`.
pub async fn next_number<C: ConnectionTrait>(
    conn: &C,
    prefix: &str,
    date: NaiveDate,
) -> Result<String, ServiceError> {
    let current = document_sequence::Entity::find_by_id(prefix.to_string())
        .one(conn)
        .await?;
    let next = match current {
        Some(row) => {
            let next = row.last_value + 1;
            document_sequence::Entity::update_many()
                .col_expr(document_sequence::Column::LastValue, Expr::value(next))
                .filter(document_sequence::Column::Prefix.eq(prefix))
                .exec(conn)
                .await?;
            next
        }
        None => {
            document_sequence::Entity::insert(document_sequence::ActiveModel {
                prefix: Set(prefix.to_string()),
                last_value: Set(1),
            })
            .exec_without_returning(conn)
            .await?;
            1
        }
    };
    Ok(format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), next))
}

// ---- condition reports ----

pub async fn find_report<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<ConditionReport, ServiceError> {
    let row = condition_report::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found::<ConditionReport>(id))?;
    decode(row.document, row.version)
}

pub async fn find_report_by_number<C: ConnectionTrait>(
    conn: &C,
    report_number: &str,
) -> Result<ConditionReport, ServiceError> {
    let row = condition_report::Entity::find()
        .filter(condition_report::Column::ReportNumber.eq(report_number))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Condition report {} not found", report_number))
        })?;
    decode(row.document, row.version)
}

pub async fn insert_report<C: ConnectionTrait>(
    conn: &C,
    mut report: ConditionReport,
) -> Result<ConditionReport, ServiceError> {
    report.version = 1;
    condition_report::Entity::insert(condition_report::ActiveModel {
        id: Set(report.id),
        report_number: Set(report.report_number.clone()),
        status: Set(report.status.to_string()),
        archived: Set(report.archived),
        version: Set(db_version(report.version)),
        document: Set(encode(&report)?),
        created_at: Set(report.created_at),
        updated_at: Set(report.updated_at),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(report)
}

pub async fn save_report<C: ConnectionTrait>(
    conn: &C,
    mut report: ConditionReport,
) -> Result<ConditionReport, ServiceError> {
    let current = report.version;
    report.version = current + 1;
    let result = condition_report::Entity::update_many()
        .col_expr(
            condition_report::Column::Status,
            Expr::value(report.status.to_string()),
        )
        .col_expr(condition_report::Column::Archived, Expr::value(report.archived))
        .col_expr(
            condition_report::Column::Version,
            Expr::value(db_version(report.version)),
        )
        .col_expr(condition_report::Column::Document, Expr::value(encode(&report)?))
        .col_expr(condition_report::Column::UpdatedAt, Expr::value(report.updated_at))
        .filter(condition_report::Column::Id.eq(report.id))
        .filter(condition_report::Column::Version.eq(db_version(current)))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let exists = condition_report::Entity::find_by_id(report.id)
            .one(conn)
            .await?
            .is_some();
        return Err(stale_or_missing::<ConditionReport>(report.id, exists));
    }
    Ok(report)
}

pub async fn delete_report<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    let result = condition_report::Entity::delete_by_id(id).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(not_found::<ConditionReport>(id));
    }
    Ok(())
}

// ---- repair slips ----

pub async fn find_slip<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<OpenRepairSlip, ServiceError> {
    let row = repair_slip::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found::<OpenRepairSlip>(id))?;
    decode(row.document, row.version)
}

/// Slips created from a report, oldest first.
pub async fn slips_for_report<C: ConnectionTrait>(
    conn: &C,
    report_id: Uuid,
) -> Result<Vec<OpenRepairSlip>, ServiceError> {
    repair_slip::Entity::find()
        .filter(repair_slip::Column::ConditionReportId.eq(report_id))
        .order_by_asc(repair_slip::Column::CreatedAt)
        .order_by_asc(repair_slip::Column::SlipNumber)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| decode(row.document, row.version))
        .collect()
}

pub async fn insert_slip<C: ConnectionTrait>(
    conn: &C,
    mut slip: OpenRepairSlip,
) -> Result<OpenRepairSlip, ServiceError> {
    slip.version = 1;
    repair_slip::Entity::insert(repair_slip::ActiveModel {
        id: Set(slip.id),
        slip_number: Set(slip.slip_number.clone()),
        condition_report_id: Set(slip.condition_report_id),
        status: Set(slip.status.to_string()),
        version: Set(db_version(slip.version)),
        document: Set(encode(&slip)?),
        created_at: Set(slip.created_date),
        updated_at: Set(slip.updated_at),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(slip)
}

pub async fn save_slip<C: ConnectionTrait>(
    conn: &C,
    mut slip: OpenRepairSlip,
) -> Result<OpenRepairSlip, ServiceError> {
    let current = slip.version;
    slip.version = current + 1;
    let result = repair_slip::Entity::update_many()
        .col_expr(
            repair_slip::Column::ConditionReportId,
            Expr::value(slip.condition_report_id),
        )
        .col_expr(repair_slip::Column::Status, Expr::value(slip.status.to_string()))
        .col_expr(repair_slip::Column::Version, Expr::value(db_version(slip.version)))
        .col_expr(repair_slip::Column::Document, Expr::value(encode(&slip)?))
        .col_expr(repair_slip::Column::UpdatedAt, Expr::value(slip.updated_at))
        .filter(repair_slip::Column::Id.eq(slip.id))
        .filter(repair_slip::Column::Version.eq(db_version(current)))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let exists = repair_slip::Entity::find_by_id(slip.id)
            .one(conn)
            .await?
            .is_some();
        return Err(stale_or_missing::<OpenRepairSlip>(slip.id, exists));
    }
    Ok(slip)
}

// ---- damage invoices ----

pub async fn find_invoice<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<DamageInvoice, ServiceError> {
    let row = damage_invoice::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found::<DamageInvoice>(id))?;
    decode(row.document, row.version)
}

/// Reverse lookup from a slip to the invoice generated from it.
pub async fn invoice_for_slip<C: ConnectionTrait>(
    conn: &C,
    slip_id: Uuid,
) -> Result<Option<DamageInvoice>, ServiceError> {
    damage_invoice::Entity::find()
        .filter(damage_invoice::Column::RepairSlipId.eq(slip_id))
        .one(conn)
        .await?
        .map(|row| decode(row.document, row.version))
        .transpose()
}

/// Unpaid invoices whose due date is before `today`, oldest first.
pub async fn pending_invoices_due_before<C: ConnectionTrait>(
    conn: &C,
    today: NaiveDate,
) -> Result<Vec<DamageInvoice>, ServiceError> {
    damage_invoice::Entity::find()
        .filter(damage_invoice::Column::PaymentStatus.eq(PaymentStatus::Pending.to_string()))
        .filter(damage_invoice::Column::DueDate.lt(today))
        .order_by_asc(damage_invoice::Column::IssueDate)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| decode(row.document, row.version))
        .collect()
}

pub async fn insert_invoice<C: ConnectionTrait>(
    conn: &C,
    mut invoice: DamageInvoice,
) -> Result<DamageInvoice, ServiceError> {
    if let Some(existing) = invoice_for_slip(conn, invoice.repair_slip_id).await? {
        return Err(ServiceError::AlreadyInvoiced {
            slip_number: invoice.repair_slip_number.clone(),
            invoice_id: existing.id,
        });
    }
    invoice.version = 1;
    damage_invoice::Entity::insert(damage_invoice::ActiveModel {
        id: Set(invoice.id),
        invoice_number: Set(invoice.invoice_number.clone()),
        repair_slip_id: Set(invoice.repair_slip_id),
        payment_status: Set(invoice.payment_status.to_string()),
        due_date: Set(invoice.due_date),
        version: Set(db_version(invoice.version)),
        document: Set(encode(&invoice)?),
        issue_date: Set(invoice.issue_date),
        updated_at: Set(invoice.updated_at),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(invoice)
}

pub async fn save_invoice<C: ConnectionTrait>(
    conn: &C,
    mut invoice: DamageInvoice,
) -> Result<DamageInvoice, ServiceError> {
    let current = invoice.version;
    invoice.version = current + 1;
    let result = damage_invoice::Entity::update_many()
        .col_expr(
            damage_invoice::Column::PaymentStatus,
            Expr::value(invoice.payment_status.to_string()),
        )
        .col_expr(
            damage_invoice::Column::Version,
            Expr::value(db_version(invoice.version)),
        )
        .col_expr(damage_invoice::Column::Document, Expr::value(encode(&invoice)?))
        .col_expr(damage_invoice::Column::UpdatedAt, Expr::value(invoice.updated_at))
        .filter(damage_invoice::Column::Id.eq(invoice.id))
        .filter(damage_invoice::Column::Version.eq(db_version(current)))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let exists = damage_invoice::Entity::find_by_id(invoice.id)
            .one(conn)
            .await?
            .is_some();
        return Err(stale_or_missing::<DamageInvoice>(invoice.id, exists));
    }
    Ok(invoice)
}

// ---- inventory adjustment log ----

/// Appends to the audit log. There is no update or delete counterpart.
pub async fn append_adjustment<C: ConnectionTrait>(
    conn: &C,
    adjustment: &InventoryAdjustment,
) -> Result<(), ServiceError> {
    debug!(
        adjustment_type = %adjustment.adjustment_type,
        reference_id = %adjustment.reference_id,
        quantity = adjustment.quantity,
        "appending inventory adjustment"
    );
    inventory_adjustment::Entity::insert(inventory_adjustment::ActiveModel {
        seq: NotSet,
        id: Set(adjustment.id),
        adjustment_type: Set(adjustment.adjustment_type.to_string()),
        reference_id: Set(adjustment.reference_id.clone()),
        item_ref: Set(adjustment.item_ref.clone()),
        quantity: Set(i64::from(adjustment.quantity)),
        document: Set(encode(adjustment)?),
        created_at: Set(adjustment.adjusted_at),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

/// Log entries in append order, optionally restricted to one RCF/ORP number.
pub async fn adjustments<C: ConnectionTrait>(
    conn: &C,
    reference_id: Option<&str>,
) -> Result<Vec<InventoryAdjustment>, ServiceError> {
    let mut query = inventory_adjustment::Entity::find();
    if let Some(reference_id) = reference_id {
        query = query.filter(inventory_adjustment::Column::ReferenceId.eq(reference_id));
    }
    query
        .order_by_asc(inventory_adjustment::Column::Seq)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row.document).map_err(|e| {
                ServiceError::InternalError(format!("Failed to decode inventory adjustment: {}", e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdjustmentType, ReferenceType, ReportMetadata, SeedItem};
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn pool() -> DbPool {
        connect(&AppConfig::default()).await.unwrap()
    }

    fn report(number: &str) -> ConditionReport {
        ConditionReport::create(
            number.to_string(),
            ReportMetadata {
                return_request_id: None,
                customer_name: "Harbor Events Ltd".to_string(),
                inspector: None,
                inspection_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                notes: None,
            },
            vec![SeedItem {
                item_ref: "TENT-6X6".to_string(),
                name: "Marquee 6x6".to_string(),
                quantity_returned: 4,
                unit_price: dec!(50),
            }],
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn failed_transaction_commits_nothing() {
        let db = pool().await;
        let report = report("RCF-1");
        let id = report.id;

        let result: Result<(), ServiceError> = transaction(&db, move |txn| {
            Box::pin(async move {
                insert_report(txn, report).await?;
                append_adjustment(
                    txn,
                    &InventoryAdjustment::record(
                        AdjustmentType::DamageDetected,
                        ReferenceType::ConditionReport,
                        "RCF-1",
                        "TENT-6X6",
                        1,
                        "tester",
                        Utc::now(),
                    ),
                )
                .await?;
                Err(ServiceError::NoCost("rollback".into()))
            })
        })
        .await;
        assert_matches!(result, Err(ServiceError::NoCost(_)));

        assert_matches!(find_report(&db, id).await, Err(ServiceError::NotFound(_)));
        assert!(adjustments(&db, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_report_round_trips() {
        let db = pool().await;
        let stored = insert_report(&db, report("RCF-5")).await.unwrap();

        let loaded = find_report(&db, stored.id).await.unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(find_report_by_number(&db, "RCF-5").await.unwrap().id, stored.id);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let db = pool().await;
        let stored = insert_report(&db, report("RCF-2")).await.unwrap();
        assert_eq!(stored.version, 1);

        let saved = save_report(&db, stored.clone()).await.unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(find_report(&db, stored.id).await.unwrap().version, 2);

        let result = save_report(&db, stored.clone()).await;
        assert_matches!(result, Err(ServiceError::ConcurrentModification(id)) if id == stored.id);

        delete_report(&db, stored.id).await.unwrap();
        assert_matches!(
            save_report(&db, saved).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn numbers_are_sequential_per_prefix() {
        let db = pool().await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let numbers = transaction(&db, move |txn| {
            Box::pin(async move {
                Ok(vec![
                    next_number(txn, "RCF", date).await?,
                    next_number(txn, "RCF", date).await?,
                    next_number(txn, "ORP", date).await?,
                ])
            })
        })
        .await
        .unwrap();
        assert_eq!(
            numbers,
            vec!["RCF-20240304-0001", "RCF-20240304-0002", "ORP-20240304-0001"]
        );

        assert_eq!(
            next_number(&db, "RCF", date).await.unwrap(),
            "RCF-20240304-0003"
        );
    }

    #[tokio::test]
    async fn reads_see_writes_inside_transaction() {
        let db = pool().await;
        let report = report("RCF-3");
        let id = report.id;
        transaction(&db, move |txn| {
            Box::pin(async move {
                insert_report(txn, report).await?;
                assert_eq!(find_report(txn, id).await?.report_number, "RCF-3");
                assert_eq!(find_report_by_number(txn, "RCF-3").await?.id, id);
                delete_report(txn, id).await?;
                assert!(find_report(txn, id).await.is_err());
                Ok(())
            })
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn adjustments_keep_append_order() {
        let db = pool().await;
        for (reference, qty) in [("RCF-9", 3), ("ORP-9", 1), ("RCF-9", 2)] {
            let entry = InventoryAdjustment::record(
                AdjustmentType::Scrapped,
                ReferenceType::ConditionReport,
                reference,
                "CHAIR-W",
                qty,
                "tester",
                Utc::now(),
            );
            append_adjustment(&db, &entry).await.unwrap();
        }

        let quantities = adjustments(&db, Some("RCF-9"))
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.quantity)
            .collect::<Vec<_>>();
        assert_eq!(quantities, vec![3, 2]);
        assert_eq!(adjustments(&db, None).await.unwrap().len(), 3);
    }
}
