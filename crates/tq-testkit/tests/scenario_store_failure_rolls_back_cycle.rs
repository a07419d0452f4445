//! Scenario: A store failure rolls back the whole cycle
//!
//! # Invariants under test
//!
//! 1. Failure while upserting the Nth of M records ⇒ no record in the cycle
//!    is marked processed and no aggregate changes.
//! 2. Same for a failure while marking the Nth record, and for a failed
//!    commit.
//! 3. Begin / fetch failures abort before anything is touched.
//! 4. The error names the phase and, where relevant, the trade id.
//! 5. Once the fault clears, the next cycle applies every record exactly once.
//! 6. A failing rollback does not mask the original error.
//! 7. An aggregate that would leave the decimal range fails the commit and
//!    applies nothing; it is never clamped.
//! 8. The cycle's reported profit total may saturate, but per-account
//!    aggregates stay exact.
//!
//! All tests are pure in-process; no DB or network required.

use rust_decimal::Decimal;
use tq_processor::{CyclePhase, QueueProcessor};
use tq_testkit::{dec, new_trade, reference_trade, FaultPlan, MemTradeStore};

fn store_with_applied_history() -> MemTradeStore {
    // acc1 already has one applied trade so "unchanged" is observable.
    let store = MemTradeStore::new();
    store.enqueue(reference_trade("acc1"));
    store
}

async fn seed(store: &MemTradeStore, processor: &QueueProcessor<MemTradeStore>) -> Vec<i64> {
    processor.run_cycle().await.unwrap();
    (0..4)
        .map(|i| store.enqueue(reference_trade(if i % 2 == 0 { "acc1" } else { "acc2" })))
        .collect()
}

fn assert_untouched(store: &MemTradeStore, ids: &[i64]) {
    for id in ids {
        assert!(!store.trade(*id).unwrap().processed, "trade {id} must stay unprocessed");
    }
    let acc1 = store.aggregate("acc1").unwrap();
    assert_eq!((acc1.trades, acc1.profit), (1, dec("500")), "acc1 must be unchanged");
    assert!(store.aggregate("acc2").is_none(), "acc2 must not be created");
}

#[tokio::test]
async fn upsert_failure_on_third_record_rolls_back_all() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_upsert_at: Some(3),
        ..FaultPlan::default()
    });
    let err = processor.run_cycle().await.unwrap_err();

    assert_eq!(err.phase, CyclePhase::Upserting);
    assert_eq!(err.trade_id, Some(ids[2]));
    assert_untouched(&store, &ids);
    assert_eq!(store.rollbacks(), 1);
}

#[tokio::test]
async fn mark_failure_on_last_record_rolls_back_all() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_mark_at: Some(4),
        ..FaultPlan::default()
    });
    let err = processor.run_cycle().await.unwrap_err();

    assert_eq!(err.phase, CyclePhase::Marking);
    assert_eq!(err.trade_id, Some(ids[3]));
    assert_untouched(&store, &ids);
}

#[tokio::test]
async fn commit_failure_leaves_nothing_durable() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_commit: true,
        ..FaultPlan::default()
    });
    let err = processor.run_cycle().await.unwrap_err();

    assert_eq!(err.phase, CyclePhase::Committing);
    assert_eq!(err.trade_id, None);
    assert_untouched(&store, &ids);
}

#[tokio::test]
async fn begin_and_fetch_failures_touch_nothing() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_begin: true,
        ..FaultPlan::default()
    });
    assert_eq!(processor.run_cycle().await.unwrap_err().phase, CyclePhase::Beginning);
    assert_untouched(&store, &ids);

    store.set_faults(FaultPlan {
        fail_fetch: true,
        ..FaultPlan::default()
    });
    assert_eq!(processor.run_cycle().await.unwrap_err().phase, CyclePhase::Fetching);
    assert_untouched(&store, &ids);
}

#[tokio::test]
async fn recovery_after_fault_applies_exactly_once() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_upsert_at: Some(2),
        ..FaultPlan::default()
    });
    for _ in 0..3 {
        assert!(processor.run_cycle().await.is_err());
    }

    store.clear_faults();
    let report = processor.run_cycle().await.unwrap();
    assert_eq!(report.applied, 4);

    for id in &ids {
        assert!(store.trade(*id).unwrap().processed);
    }
    let acc1 = store.aggregate("acc1").unwrap();
    assert_eq!((acc1.trades, acc1.profit), (3, dec("1500")));
    let acc2 = store.aggregate("acc2").unwrap();
    assert_eq!((acc2.trades, acc2.profit), (2, dec("1000")));
}

#[tokio::test]
async fn failed_rollback_keeps_original_error() {
    let store = store_with_applied_history();
    let processor = QueueProcessor::new(store.clone());
    let ids = seed(&store, &processor).await;

    store.set_faults(FaultPlan {
        fail_upsert_at: Some(1),
        fail_rollback: true,
        ..FaultPlan::default()
    });
    let err = processor.run_cycle().await.unwrap_err();

    assert_eq!(err.phase, CyclePhase::Upserting);
    assert_eq!(err.source.op, "upsert_aggregate");
    assert!(err.to_string().contains("upserting"), "got: {err}");
    assert_untouched(&store, &ids);
}

// (5e23 - 1) × 1 × 100000 ≈ 5e28: fits a Decimal once, not twice.
fn huge_trade(account: &str) -> tq_schemas::NewTrade {
    new_trade(account, "EURUSD", "buy", "1", "1", "500000000000000000000000")
}

#[tokio::test]
async fn aggregate_overflow_fails_commit_and_applies_nothing() {
    let store = MemTradeStore::new();
    let a = store.enqueue(huge_trade("whale"));
    let b = store.enqueue(huge_trade("whale"));

    let err = QueueProcessor::new(store.clone()).run_cycle().await.unwrap_err();

    assert_eq!(err.phase, CyclePhase::Committing);
    assert_eq!(err.source.op, "commit");
    assert!(store.aggregate("whale").is_none(), "no clamped aggregate may land");
    assert!(!store.trade(a).unwrap().processed);
    assert!(!store.trade(b).unwrap().processed);
}

#[tokio::test]
async fn report_total_saturates_but_aggregates_stay_exact() {
    let store = MemTradeStore::new();
    store.enqueue(huge_trade("whale-a"));
    store.enqueue(huge_trade("whale-b"));

    let report = QueueProcessor::new(store.clone()).run_cycle().await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.profit_applied, Decimal::MAX);

    let expected = (dec("500000000000000000000000") - Decimal::ONE) * Decimal::from(100_000);
    assert_eq!(store.aggregate("whale-a").unwrap().profit, expected);
    assert_eq!(store.aggregate("whale-b").unwrap().profit, expected);
}
