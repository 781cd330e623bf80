use chrono::{NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;

use equipment_inspection::{
    models::{
        ConditionReport, Disposition, OpenRepairSlip, RepairAction, RepairItem, RepairStatus,
        ReportMetadata, SeedItem,
    },
    services::{
        damage_invoices::build_invoice_lines,
        repair_ledger::{record_progress, RepairProgress},
    },
};

fn seeded_report(lines: usize) -> ConditionReport {
    let metadata = ReportMetadata {
        return_request_id: Some("RR-BENCH".into()),
        customer_name: "Harbor Events Ltd".into(),
        inspector: None,
        inspection_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default(),
        notes: None,
    };
    let seeds = (0..lines)
        .map(|i| SeedItem {
            item_ref: format!("ITEM-{i:04}"),
            name: format!("Rental item {i}"),
            quantity_returned: 20,
            unit_price: dec!(35.50),
        })
        .collect();
    ConditionReport::create("RCF-20240304-0001".into(), metadata, seeds, Utc::now())
        .expect("bench report")
}

// Disposition updates re-derive the line and the report totals
fn disposition_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_item_disposition");

    for size in [1usize, 10, 50, 200].iter() {
        let report = seeded_report(*size);
        let last = report.items[size - 1].id;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut report = report.clone();
                report
                    .update_item_disposition(black_box(last), Disposition::new(15, 4, 1), Utc::now())
                    .map(|item| item.estimated_repair_cost)
            });
        });
    }

    group.finish();
}

fn repair_progress_benchmark(c: &mut Criterion) {
    let item = RepairItem::manual("TRUSS-3M", "Box truss 3m", 50, dec!(45)).expect("bench item");
    let progress = RepairProgress {
        delta_repaired: 50,
        new_status: RepairStatus::Completed,
        notes: None,
    };

    c.bench_function("record_progress", |b| {
        b.iter(|| record_progress(black_box(&item), black_box(&progress), Utc::now()))
    });
}

fn invoice_lines_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_invoice_lines");

    for size in [1usize, 10, 50].iter() {
        let items = (0..*size)
            .map(|i| {
                let mut item = RepairItem::manual(format!("ITEM-{i:04}"), "Stage deck", 4, dec!(30))
                    .expect("bench item");
                item.quantity_write_off = 1;
                item.repair_actions = vec![
                    RepairAction {
                        label: "Resurface".into(),
                        quantity: 3,
                        unit_cost: dec!(12),
                    },
                    RepairAction {
                        label: "Replace leg".into(),
                        quantity: 1,
                        unit_cost: dec!(18.75),
                    },
                ];
                item
            })
            .collect();
        let slip = OpenRepairSlip::new(
            "ORP-20240304-0001".into(),
            "Harbor Events Ltd".into(),
            items,
            Utc::now(),
        )
        .expect("bench slip");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| build_invoice_lines(black_box(&slip)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    disposition_benchmark,
    repair_progress_benchmark,
    invoice_lines_benchmark
);
criterion_main!(benches);
