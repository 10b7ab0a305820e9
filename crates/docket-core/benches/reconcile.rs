use docket_core::document::{BusinessKey, Row, StoredDocument};
use docket_core::layout::layout_rows;
use docket_core::merge::merge_latest;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

struct Tier {
    name: &'static str,
    docs: usize,
    keys: usize,
}

const TIERS: [Tier; 3] = [
    Tier {
        name: "small",
        docs: 100,
        keys: 10,
    },
    Tier {
        name: "medium",
        docs: 2_000,
        keys: 120,
    },
    Tier {
        name: "large",
        docs: 20_000,
        keys: 365,
    },
];

/// Deterministic documents: every key is written several times with a mix of
/// timestamp sources.
fn corpus(tier: &Tier) -> Vec<StoredDocument> {
    (0..tier.docs)
        .map(|i| {
            let day = i % tier.keys;
            let date = chrono::NaiveDate::from_yo_opt(2024, u32::try_from(day % 365 + 1).unwrap_or(1))
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let payload = json!({"reportDate": date, "items": []});
            let ms = 1_700_000_000_000_i64 + i64::try_from(i).unwrap_or(0) * 7_919 % 86_400_000;
            let doc = StoredDocument::new(format!("{:024x}", i), "daily-report", payload);
            match i % 3 {
                0 => doc.with_created_at(ms),
                1 => doc.with_updated_at(ms),
                _ => doc,
            }
        })
        .collect()
}

fn key_of(doc: &StoredDocument) -> Option<BusinessKey> {
    doc.payload
        .get("reportDate")
        .and_then(Value::as_str)
        .and_then(BusinessKey::date)
}

fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| Row {
            box_code: if i % 7 == 6 {
                String::new()
            } else {
                format!("BX-{}", i / 5)
            },
            box_name: "Crate".into(),
            item_code: format!("I{i}"),
            ..Row::default()
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile.merge_latest");

    for tier in &TIERS {
        let docs = corpus(tier);
        group.throughput(Throughput::Elements(docs.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tier.name), &docs, |b, docs| {
            b.iter(|| black_box(merge_latest(docs.iter().cloned(), key_of).len()));
        });
    }

    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile.layout_rows");

    for n in [50_usize, 500, 5_000] {
        let rows = rows(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| black_box(layout_rows(rows)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_layout);
criterion_main!(benches);
