//! Property-based tests for the inspection and repair ledgers.
//!
//! These exercise the quantity and status invariants across a wide range of
//! inputs rather than the handful of cases the unit tests pin down.

use chrono::{NaiveDate, Utc};
use equipment_inspection::{
    errors::ServiceError,
    models::{
        AdjustmentType, ConditionReport, Disposition, ItemCondition, OpenRepairSlip,
        ReportMetadata, RepairAction, RepairItem, RepairStatus, SeedItem, SlipStatus,
    },
    services::{
        cost_calculator::{estimate_cost, invoice_tax, line_total},
        damage_invoices::{build_invoice_lines, InvoiceAmounts},
        quantity_ledger::apply_disposition,
        repair_ledger::{record_progress, RepairProgress},
    },
};
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn disposition_strategy() -> impl Strategy<Value = Disposition> {
    (0u32..40, 0u32..40, 0u32..40).prop_map(|(g, r, w)| Disposition::new(g, r, w))
}

fn repair_status_strategy() -> impl Strategy<Value = RepairStatus> {
    prop_oneof![
        Just(RepairStatus::Pending),
        Just(RepairStatus::InProgress),
        Just(RepairStatus::Completed),
        Just(RepairStatus::Scrapped),
    ]
}

fn progress_strategy() -> impl Strategy<Value = RepairProgress> {
    (0u32..12, repair_status_strategy()).prop_map(|(delta, status)| RepairProgress {
        delta_repaired: delta,
        new_status: status,
        notes: None,
    })
}

/// A repair item partway through its repair, with the ledger invariant intact.
fn repair_item_strategy() -> impl Strategy<Value = RepairItem> {
    (1u32..20, price_strategy(), repair_status_strategy())
        .prop_flat_map(|(quantity, cost, status)| (Just(quantity), 0..=quantity, Just(cost), Just(status)))
        .prop_map(|(quantity, repaired, cost, status)| {
            let mut item = RepairItem::manual("TRUSS-3M", "Box truss 3m", quantity, cost).unwrap();
            item.quantity_repaired = repaired;
            item.quantity_remaining = quantity - repaired;
            item.repair_status = if item.quantity_remaining == 0 {
                RepairStatus::Completed
            } else {
                status
            };
            item
        })
}

fn report(quantity_returned: u32, unit_price: Decimal) -> ConditionReport {
    let metadata = ReportMetadata {
        return_request_id: Some("RR-PROP".into()),
        customer_name: "Harbor Events Ltd".into(),
        inspector: None,
        inspection_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        notes: None,
    };
    let seeds = vec![SeedItem {
        item_ref: "STAGE-DECK".into(),
        name: "Stage deck 2x1".into(),
        quantity_returned,
        unit_price,
    }];
    ConditionReport::create("RCF-20240304-0001".into(), metadata, seeds, Utc::now()).unwrap()
}

// Property: a disposition is applied only when it fits the returned quantity
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn disposition_never_exceeds_returned(
        returned in 0u32..60,
        price in price_strategy(),
        disposition in disposition_strategy(),
    ) {
        let original = report(returned, price);
        let mut candidate = original.clone();
        let item_id = original.items[0].id;

        let result = candidate
            .update_item_disposition(item_id, disposition, Utc::now())
            .map(|item| item.clone());
        match result {
            Ok(item) => {
                prop_assert!(disposition.total() <= u64::from(returned));
                prop_assert_eq!(item.disposition(), disposition);
                prop_assert_eq!(
                    item.estimated_repair_cost,
                    estimate_cost(price, disposition.repair, disposition.write_off).unwrap()
                );
                prop_assert_eq!(item.repair_required, disposition.repair + disposition.write_off > 0);
            }
            Err(ServiceError::QuantityExceeded { requested, .. }) => {
                prop_assert!(disposition.total() > u64::from(returned));
                prop_assert_eq!(requested, disposition.total());
                prop_assert_eq!(&candidate, &original);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn report_totals_match_lines(
        returned in 0u32..60,
        price in price_strategy(),
        disposition in disposition_strategy(),
    ) {
        let mut report = report(returned, price);
        let item_id = report.items[0].id;
        let _ = report.update_item_disposition(item_id, disposition, Utc::now());

        let item = &report.items[0];
        prop_assert_eq!(report.totals.total_items_inspected, u64::from(returned));
        prop_assert_eq!(report.totals.total_good, u64::from(item.quantity_good));
        prop_assert_eq!(report.totals.total_repair, u64::from(item.quantity_repair));
        prop_assert_eq!(report.totals.total_write_off, u64::from(item.quantity_write_off));
        prop_assert_eq!(report.totals.total_repair_cost, item.estimated_repair_cost);

        let before = report.totals.clone();
        report.recalculate_totals().unwrap();
        prop_assert_eq!(report.totals, before);
    }

    #[test]
    fn condition_tracks_worst_disposition(disposition in disposition_strategy()) {
        let returned = u32::try_from(disposition.total()).unwrap();
        let seeded = report(returned, Decimal::ONE_HUNDRED);
        let item = apply_disposition(&seeded.items[0], disposition).unwrap();

        let expected = if disposition.write_off > 0 {
            ItemCondition::BeyondRepair
        } else if disposition.repair > 0 {
            ItemCondition::MajorDamage
        } else {
            ItemCondition::Good
        };
        prop_assert_eq!(item.condition, expected);
        prop_assert!(item.is_fully_accounted());
    }
}

// Property: repaired + remaining == quantity across any update sequence
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn repair_ledger_conserves_quantity(
        quantity in 1u32..15,
        updates in prop::collection::vec(progress_strategy(), 1..12),
    ) {
        let mut item =
            RepairItem::manual("TRUSS-3M", "Box truss 3m", quantity, Decimal::TEN).unwrap();
        let mut resolutions = Vec::new();

        for update in &updates {
            match record_progress(&item, update, Utc::now()) {
                Ok(outcome) => {
                    prop_assert_eq!(
                        outcome.item.quantity_repaired + outcome.item.quantity_remaining,
                        quantity
                    );
                    if matches!(update.new_status, RepairStatus::Pending | RepairStatus::InProgress) {
                        prop_assert_eq!(outcome.item.quantity_remaining, item.quantity_remaining);
                    }
                    if let Some(resolution) = outcome.resolution {
                        prop_assert_eq!(outcome.item.quantity_remaining, 0);
                        prop_assert_eq!(resolution.quantity, update.delta_repaired);
                        resolutions.push(resolution);
                    }
                    item = outcome.item;
                }
                Err(ServiceError::InvalidQuantity(_)) => {
                    prop_assert!(
                        update.delta_repaired == 0 || update.delta_repaired > item.quantity_remaining
                    );
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        // remaining only reaches zero once, so at most one resolution is ever produced
        prop_assert!(resolutions.len() <= 1);
        prop_assert_eq!(resolutions.len() == 1, item.quantity_remaining == 0);
        if let Some(resolution) = resolutions.first() {
            prop_assert!(matches!(
                resolution.adjustment_type,
                AdjustmentType::RepairCompleted | AdjustmentType::Scrapped
            ));
        }
    }

    #[test]
    fn rejected_progress_leaves_item_untouched(
        item in repair_item_strategy(),
        update in progress_strategy(),
    ) {
        let before = item.clone();
        if record_progress(&item, &update, Utc::now()).is_err() {
            prop_assert_eq!(item, before);
        }
    }
}

// Property: slip status is a pure function of its items
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn slip_status_is_derived_from_items(
        items in prop::collection::vec(repair_item_strategy(), 0..6),
    ) {
        let status = OpenRepairSlip::derive_status(&items);
        prop_assert_eq!(OpenRepairSlip::derive_status(&items), status);

        let all_resolved = !items.is_empty() && items.iter().all(|item| item.quantity_remaining == 0);
        let any_in_progress = items
            .iter()
            .any(|item| item.repair_status == RepairStatus::InProgress);
        let expected = if all_resolved {
            SlipStatus::Completed
        } else if any_in_progress {
            SlipStatus::InRepair
        } else {
            SlipStatus::Open
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn refreshing_a_slip_is_idempotent(
        items in prop::collection::vec(repair_item_strategy(), 0..6),
    ) {
        let now = Utc::now();
        let mut slip =
            OpenRepairSlip::new("ORP-20240304-0001".into(), "Harbor Events Ltd".into(), items, now)
                .unwrap();
        let once = slip.clone();
        slip.refresh(now).unwrap();

        prop_assert_eq!(&slip, &once);
        prop_assert_eq!(
            slip.estimated_cost,
            slip.items.iter().map(|item| item.total_cost).sum::<Decimal>()
        );
    }
}

// Property: costing arithmetic
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn estimate_is_additive_in_quantities(
        price in price_strategy(),
        repair in 0u32..50,
        write_off in 0u32..50,
    ) {
        let combined = estimate_cost(price, repair, write_off).unwrap();
        prop_assert_eq!(
            combined,
            estimate_cost(price, repair, 0).unwrap() + estimate_cost(price, 0, write_off).unwrap()
        );
        prop_assert!(!combined.is_sign_negative());
    }

    #[test]
    fn invoice_tax_is_rounded_to_cents(quantity in 0u32..100, unit_price in price_strategy()) {
        let subtotal = line_total(quantity, unit_price).unwrap();
        let tax = invoice_tax(subtotal).unwrap();
        prop_assert!(tax.scale() <= 2);
        prop_assert!((tax - subtotal * Decimal::new(6, 2)).abs() <= Decimal::new(5, 3));
    }
}

/// Slip items copied from inspected lines, some with priced repair actions.
fn invoiced_item_strategy() -> impl Strategy<Value = RepairItem> {
    (
        price_strategy(),
        disposition_strategy(),
        prop::collection::vec((1u32..5, price_strategy()), 0..3),
    )
        .prop_filter("needs damaged units", |(_, d, _)| d.repair + d.write_off > 0)
        .prop_map(|(price, disposition, actions)| {
            let returned = u32::try_from(disposition.total()).unwrap();
            let seeded = report(returned, price);
            let line = apply_disposition(&seeded.items[0], disposition).unwrap();
            let mut item = RepairItem::from_inspected(&line).unwrap();
            item.set_repair_actions(
                actions
                    .into_iter()
                    .enumerate()
                    .map(|(i, (quantity, unit_cost))| RepairAction {
                        label: format!("Action {}", i),
                        quantity,
                        unit_cost,
                    })
                    .collect(),
            )
            .unwrap();
            item
        })
}

// Property: invoice total is exactly subtotal plus cent-rounded tax
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn invoice_total_is_subtotal_plus_tax_to_the_cent(
        items in prop::collection::vec(invoiced_item_strategy(), 1..5),
    ) {
        let slip = OpenRepairSlip::new(
            "ORP-20240304-0001".into(),
            "Harbor Events Ltd".into(),
            items,
            Utc::now(),
        )
        .unwrap();
        let lines = build_invoice_lines(&slip).unwrap();
        let amounts = InvoiceAmounts::from_lines(&lines).unwrap();

        prop_assert!(amounts.tax.scale() <= 2);
        prop_assert_eq!(amounts.total, amounts.subtotal + amounts.tax);
        prop_assert_eq!(amounts.total - amounts.subtotal, amounts.tax);

        let to_cents = |amount: Decimal| {
            amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        prop_assert_eq!(to_cents(amounts.total), to_cents(amounts.subtotal) + amounts.tax);
        prop_assert_eq!(
            amounts.subtotal,
            lines.iter().map(|line| line.total).sum::<Decimal>()
        );
    }
}
