use std::collections::BTreeMap;

use docket_core::document::{BusinessKey, StoredDocument};
use docket_core::layout::{group_spans, layout_rows, normalize_group_id, run_groups};
use docket_core::merge::merge_latest;
use proptest::prelude::*;
use serde_json::Value;

use generators::*;

fn date_key(doc: &StoredDocument) -> Option<BusinessKey> {
    doc.payload
        .get("reportDate")
        .and_then(Value::as_str)
        .and_then(BusinessKey::date)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn start_spans_partition_the_rows(keys in arb_group_keys()) {
        let cells = group_spans(&keys);
        prop_assert_eq!(cells.len(), keys.len());

        let covered: usize = cells.iter().filter(|c| c.is_start).map(|c| c.span).sum();
        prop_assert_eq!(covered, keys.len());

        let runs = run_groups(&cells);
        let mut next = 0;
        for run in &runs {
            prop_assert_eq!(run.start, next);
            prop_assert!(run.len >= 1);
            next = run.range().end;
        }
        prop_assert_eq!(next, keys.len());
    }

    #[test]
    fn blank_keys_are_singletons(keys in arb_group_keys()) {
        let cells = group_spans(&keys);
        for (key, cell) in keys.iter().zip(&cells) {
            if normalize_group_id(key).is_empty() {
                prop_assert_eq!(cell.span, 1);
                prop_assert!(cell.is_start && cell.is_end);
                prop_assert_eq!(cell.group_id.as_str(), "");
            }
        }
    }

    #[test]
    fn ordinals_count_runs(keys in arb_group_keys()) {
        let cells = group_spans(&keys);
        let runs = run_groups(&cells);
        for (i, run) in runs.iter().enumerate() {
            prop_assert_eq!(run.ordinal, i + 1);
            for cell in &cells[run.range()] {
                prop_assert_eq!(cell.ordinal, run.ordinal);
            }
        }
    }

    #[test]
    fn adjacent_runs_differ_unless_blank(keys in arb_group_keys()) {
        let runs = run_groups(&group_spans(&keys));
        for pair in runs.windows(2) {
            if !pair[0].group_id.is_empty() {
                prop_assert_ne!(&pair[0].group_id, &pair[1].group_id);
            }
        }
    }

    #[test]
    fn row_layout_partitions(rows in arb_rows()) {
        let cells = layout_rows(&rows);
        let covered: usize = cells.iter().filter(|c| c.is_start).map(|c| c.span).sum();
        prop_assert_eq!(covered, rows.len());
    }

    #[test]
    fn newest_document_wins_in_any_order(
        docs in arb_report_docs().prop_shuffle(),
    ) {
        let merged = merge_latest(docs.clone(), date_key);

        let mut expected: BTreeMap<BusinessKey, (i64, String)> = BTreeMap::new();
        for doc in &docs {
            let key = date_key(doc).expect("generated dates parse");
            let ts = doc.effective_timestamp();
            let entry = expected.entry(key).or_insert((ts, doc.id.clone()));
            if ts > entry.0 {
                *entry = (ts, doc.id.clone());
            }
        }

        prop_assert_eq!(merged.len(), expected.len());
        for (key, (ts, id)) in expected {
            let record = &merged[&key];
            prop_assert_eq!(&record.document.id, &id);
            prop_assert_eq!(record.effective_timestamp, ts);
            prop_assert!(!record.superseded.contains(&id));
        }
    }

    #[test]
    fn merge_is_idempotent(docs in arb_report_docs()) {
        let once = merge_latest(docs.clone(), date_key);
        let winners: Vec<StoredDocument> =
            once.values().map(|record| record.document.clone()).collect();
        let twice = merge_latest(winners, date_key);
        prop_assert_eq!(once.len(), twice.len());
        for (key, record) in &once {
            prop_assert_eq!(&twice[key].document, &record.document);
        }
    }
}
