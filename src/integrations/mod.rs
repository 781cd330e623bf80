/*!
 * # External Collaborators
 *
 * Seams to the systems that sit around inspection: the return request that
 * tells us what came back, the catalog that prices it, and billing which
 * raises the additional charge once a damage invoice exists.
 *
 * In-memory implementations back local runs and tests.
 */

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;

/// A line of a return request as reported by the return source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnedItem {
    pub item_ref: String,
    pub name: String,
    pub quantity_returned: u32,
}

/// Charge raised against the customer once a damage invoice is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub repair_slip_id: Uuid,
    pub repair_slip_number: String,
    pub customer_name: String,
    pub amount: Decimal,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReturnSource: Send + Sync {
    async fn returned_items(&self, return_request_id: &str)
        -> Result<Vec<ReturnedItem>, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    async fn unit_price(&self, item_ref: &str) -> Result<Decimal, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdditionalChargeSink: Send + Sync {
    async fn create_additional_charge(&self, charge: &AdditionalCharge)
        -> Result<(), ServiceError>;
}

/// Return requests registered in process.
#[derive(Debug, Default)]
pub struct InMemoryReturnSource {
    requests: DashMap<String, Vec<ReturnedItem>>,
}

impl InMemoryReturnSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, return_request_id: impl Into<String>, items: Vec<ReturnedItem>) {
        self.requests.insert(return_request_id.into(), items);
    }
}

#[async_trait]
impl ReturnSource for InMemoryReturnSource {
    async fn returned_items(
        &self,
        return_request_id: &str,
    ) -> Result<Vec<ReturnedItem>, ServiceError> {
        self.requests
            .get(return_request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Return request {} not found", return_request_id))
            })
    }
}

/// Price list keyed by item reference.
#[derive(Debug, Default)]
pub struct InMemoryPriceCatalog {
    prices: DashMap<String, Decimal>,
}

impl InMemoryPriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, item_ref: impl Into<String>, unit_price: Decimal) {
        self.prices.insert(item_ref.into(), unit_price);
    }
}

#[async_trait]
impl PriceCatalog for InMemoryPriceCatalog {
    async fn unit_price(&self, item_ref: &str) -> Result<Decimal, ServiceError> {
        self.prices
            .get(item_ref)
            .map(|price| *price.value())
            .ok_or_else(|| ServiceError::NotFound(format!("No catalog price for {}", item_ref)))
    }
}

/// Keeps every charge it receives; stands in for the billing system.
#[derive(Debug, Default, Clone)]
pub struct RecordingChargeSink {
    charges: Arc<Mutex<Vec<AdditionalCharge>>>,
}

impl RecordingChargeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn charges(&self) -> Vec<AdditionalCharge> {
        self.charges.lock().await.clone()
    }
}

#[async_trait]
impl AdditionalChargeSink for RecordingChargeSink {
    async fn create_additional_charge(&self, charge: &AdditionalCharge) -> Result<(), ServiceError> {
        info!(
            invoice_number = %charge.invoice_number,
            slip_number = %charge.repair_slip_number,
            amount = %charge.amount,
            "additional charge recorded"
        );
        self.charges.lock().await.push(charge.clone());
        Ok(())
    }
}
