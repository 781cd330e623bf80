//! Fixed costing rules for inspected rental equipment.
//!
//! Repairs are estimated at 60% of the unit price and write-offs are billed at
//! 120% of the unit price. Neither rate is configurable.
//!
//! All arithmetic is checked; an amount that leaves the `Decimal` range is
//! reported as `AmountOutOfRange` instead of panicking.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use validator::ValidationError;

use crate::errors::ServiceError;

/// Share of the unit price charged per unit sent to repair.
pub const REPAIR_RATE: Decimal = dec!(0.6);
/// Share of the unit price charged per unit written off.
pub const WRITE_OFF_RATE: Decimal = dec!(1.2);
/// Tax applied to every damage invoice subtotal.
pub const DAMAGE_INVOICE_TAX_RATE: Decimal = dec!(0.06);
/// Largest unit price or unit cost accepted from a request or the price catalog.
pub const MAX_UNIT_AMOUNT: Decimal = dec!(1_000_000_000);

fn out_of_range(what: &str) -> ServiceError {
    ServiceError::AmountOutOfRange(format!("{} is too large to calculate", what))
}

/// Request-level check for money inputs: non-negative and at most [`MAX_UNIT_AMOUNT`].
pub fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Amount cannot be negative".into());
        return Err(err);
    }
    if *amount > MAX_UNIT_AMOUNT {
        let mut err = ValidationError::new("max_amount");
        err.message = Some(format!("Amount cannot exceed {}", MAX_UNIT_AMOUNT).into());
        return Err(err);
    }
    Ok(())
}

/// Same bound for amounts that do not arrive through a validated request.
pub fn ensure_amount(item_ref: &str, amount: Decimal) -> Result<Decimal, ServiceError> {
    validate_amount(&amount).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Price {} for {} must be between 0 and {}",
            amount, item_ref, MAX_UNIT_AMOUNT
        ))
    })?;
    Ok(amount)
}

/// Estimated damage cost for one inspected line.
pub fn estimate_cost(
    unit_price: Decimal,
    repair_qty: u32,
    write_off_qty: u32,
) -> Result<Decimal, ServiceError> {
    let repair = line_total(repair_qty, unit_price)?
        .checked_mul(REPAIR_RATE)
        .ok_or_else(|| out_of_range("Repair estimate"))?;
    let write_off = line_total(write_off_qty, unit_price)?
        .checked_mul(WRITE_OFF_RATE)
        .ok_or_else(|| out_of_range("Write-off estimate"))?;
    repair
        .checked_add(write_off)
        .ok_or_else(|| out_of_range("Estimated repair cost"))
}

/// Blended per-unit rate used to seed a repair item from its inspected line.
pub fn per_unit_rate(estimated_cost: Decimal, units: u32) -> Decimal {
    if units == 0 {
        return Decimal::ZERO;
    }
    estimated_cost / Decimal::from(units)
}

pub fn line_total(quantity: u32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| out_of_range("Line total"))
}

pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, ServiceError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).ok_or_else(|| out_of_range("Total"))
    })
}

/// Tax on an invoice subtotal, rounded to cents.
pub fn invoice_tax(subtotal: Decimal) -> Result<Decimal, ServiceError> {
    subtotal
        .checked_mul(DAMAGE_INVOICE_TAX_RATE)
        .map(|tax| tax.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| out_of_range("Invoice tax"))
}
