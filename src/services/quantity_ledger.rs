use crate::{
    errors::ServiceError,
    models::condition_report::{Disposition, InspectedLineItem},
};

/// Applies a good/repair/write-off split to an inspected line.
///
/// The input line is never modified; on success a new line is returned with
/// condition, repair flag and estimated cost re-derived.
pub fn apply_disposition(
    item: &InspectedLineItem,
    disposition: Disposition,
) -> Result<InspectedLineItem, ServiceError> {
    let requested = disposition.total();
    if requested > u64::from(item.quantity_returned) {
        return Err(ServiceError::QuantityExceeded {
            item_ref: item.item_ref.clone(),
            requested,
            returned: item.quantity_returned,
        });
    }

    let mut updated = item.clone();
    updated.quantity_good = disposition.good;
    updated.quantity_repair = disposition.repair;
    updated.quantity_write_off = disposition.write_off;
    updated.refresh_derived()?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::condition_report::ItemCondition;
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn item() -> InspectedLineItem {
        InspectedLineItem::seed("STAGE-DECK", "Stage deck 2x1", 10, dec!(50))
    }

    #[test]
    fn split_within_returned_quantity_is_applied() {
        let updated = apply_disposition(&item(), Disposition::new(7, 2, 1)).unwrap();
        assert_eq!(updated.quantity_good, 7);
        assert_eq!(updated.quantity_repair, 2);
        assert_eq!(updated.quantity_write_off, 1);
        assert_eq!(updated.estimated_repair_cost, dec!(120));
        assert_eq!(updated.condition, ItemCondition::BeyondRepair);
        assert!(updated.repair_required);
    }

    #[test]
    fn partial_split_below_returned_is_allowed() {
        let updated = apply_disposition(&item(), Disposition::new(3, 0, 0)).unwrap();
        assert_eq!(updated.condition, ItemCondition::Good);
        assert!(!updated.repair_required);
        assert!(!updated.is_fully_accounted());
    }

    #[test]
    fn repair_only_is_major_damage() {
        let updated = apply_disposition(&item(), Disposition::new(8, 2, 0)).unwrap();
        assert_eq!(updated.condition, ItemCondition::MajorDamage);
        assert_eq!(updated.estimated_repair_cost, dec!(60));
    }

    #[test]
    fn over_allocation_is_rejected() {
        let original = item();
        let result = apply_disposition(&original, Disposition::new(8, 2, 1));
        assert_matches!(
            result,
            Err(ServiceError::QuantityExceeded {
                requested: 11,
                returned: 10,
                ..
            })
        );
        assert_eq!(original.quantity_good, 10);
    }

    #[test]
    fn huge_price_is_reported_instead_of_overflowing() {
        let seeded = InspectedLineItem::seed("STAGE-DECK", "Stage deck 2x1", 10, Decimal::MAX);
        let result = apply_disposition(&seeded, Disposition::new(7, 2, 1));
        assert_matches!(result, Err(ServiceError::AmountOutOfRange(_)));
    }

    #[test]
    fn huge_counts_do_not_wrap() {
        let result = apply_disposition(&item(), Disposition::new(u32::MAX, u32::MAX, 2));
        assert_matches!(result, Err(ServiceError::QuantityExceeded { .. }));
    }
}
