//! One processing cycle over the trade queue.
//!
//! # State diagram
//!
//! ```text
//!  Idle ─► Beginning ─► Fetching ─┬─► Validating ─► Scoring ─► Upserting ─► Marking ─┐
//!                                 │       │ invalid: log, skip      ▲                 │
//!                                 │       └─────────────────────────┼── next record ◄─┘
//!                                 └─► Committing ─► Idle            │
//!
//!  any store error ─► Aborting (rollback) ─► Idle
//! ```
//!
//! A cycle is all-or-nothing: one [`UnitOfWork`] spans every record, and a
//! store error at any step rolls back every record applied so far in the
//! same cycle. Validation failures never abort; the record stays
//! unprocessed and is seen again next cycle.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::store::{StoreError, TradeStore, UnitOfWork};

// ---------------------------------------------------------------------------
// CyclePhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePhase {
    Idle,
    Beginning,
    Fetching,
    Validating,
    Scoring,
    Upserting,
    Marking,
    Committing,
    Aborting,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Beginning => "beginning",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Validating => "validating",
            CyclePhase::Scoring => "scoring",
            CyclePhase::Upserting => "upserting",
            CyclePhase::Marking => "marking",
            CyclePhase::Committing => "committing",
            CyclePhase::Aborting => "aborting",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CycleError / CycleReport
// ---------------------------------------------------------------------------

/// The first store-level failure of an aborted cycle.
#[derive(Debug, thiserror::Error)]
#[error("cycle aborted while {phase}{}: {source}", trade_suffix(.trade_id))]
pub struct CycleError {
    pub phase: CyclePhase,
    pub trade_id: Option<i64>,
    #[source]
    pub source: StoreError,
}

fn trade_suffix(trade_id: &Option<i64>) -> String {
    match trade_id {
        Some(id) => format!(" trade {id}"),
        None => String::new(),
    }
}

impl CycleError {
    fn new(phase: CyclePhase, trade_id: Option<i64>, source: StoreError) -> Self {
        Self {
            phase,
            trade_id,
            source,
        }
    }
}

/// What a committed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Decoded records returned by the queue query.
    pub fetched: usize,
    /// Records folded into aggregates and marked processed.
    pub applied: usize,
    /// Records that failed validation or scoring; left unprocessed.
    pub skipped_invalid: usize,
    /// Rows the store could not decode; left unprocessed.
    pub skipped_undecodable: usize,
    /// Sum of profits applied in this cycle, for logging only. Saturates at
    /// the `Decimal` bounds; the stored aggregates stay exact.
    pub profit_applied: Decimal,
}

impl CycleReport {
    fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            fetched: 0,
            applied: 0,
            skipped_invalid: 0,
            skipped_undecodable: 0,
            profit_applied: Decimal::ZERO,
        }
    }

    /// Nothing was queued at all.
    pub fn is_empty(&self) -> bool {
        self.fetched == 0 && self.skipped_undecodable == 0
    }
}

// ---------------------------------------------------------------------------
// QueueProcessor
// ---------------------------------------------------------------------------

/// Drives cycles against one store. The caller guarantees cycles never
/// overlap; [`crate::run_loop`] does so by awaiting each cycle before
/// asking for the next tick.
pub struct QueueProcessor<S> {
    store: S,
}

impl<S: TradeStore> QueueProcessor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one cycle: commit everything or nothing.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        debug!(phase = %CyclePhase::Beginning, "cycle start");

        let mut unit = self
            .store
            .begin()
            .await
            .map_err(|e| CycleError::new(CyclePhase::Beginning, None, e))?;

        match apply_batch(&mut unit, started_at).await {
            Ok(mut report) => {
                unit.commit()
                    .await
                    .map_err(|e| CycleError::new(CyclePhase::Committing, None, e))?;
                report.finished_at = Utc::now();
                Ok(report)
            }
            Err(err) => {
                debug!(phase = %CyclePhase::Aborting, failed_in = %err.phase, "rolling back cycle");
                if let Err(rb) = unit.rollback().await {
                    // The unit is gone either way; keep the original error.
                    warn!(error = %rb, "rollback after aborted cycle failed");
                }
                Err(err)
            }
        }
    }
}

/// Fetch and fold every unprocessed record into `unit`. Returns on the first
/// store error without touching the remaining records.
async fn apply_batch<U: UnitOfWork>(
    unit: &mut U,
    started_at: DateTime<Utc>,
) -> Result<CycleReport, CycleError> {
    let mut report = CycleReport::started(started_at);

    let batch = unit
        .fetch_unprocessed()
        .await
        .map_err(|e| CycleError::new(CyclePhase::Fetching, None, e))?;

    report.fetched = batch.records.len();
    report.skipped_undecodable = batch.undecodable.len();
    for row in &batch.undecodable {
        warn!(trade_id = ?row.id, reason = %row.reason, "undecodable trade row skipped; left unprocessed");
    }

    for record in &batch.records {
        let trade = match tq_rules::validate(record) {
            Ok(t) => t,
            Err(violation) => {
                warn!(
                    trade_id = record.id,
                    account = %record.account,
                    reason = %violation,
                    "invalid trade skipped; left unprocessed for retry"
                );
                report.skipped_invalid += 1;
                continue;
            }
        };

        let profit = match tq_rules::profit(&trade) {
            Ok(p) => p,
            Err(e) => {
                warn!(trade_id = trade.id, account = %trade.account, error = %e, "trade cannot be scored; left unprocessed");
                report.skipped_invalid += 1;
                continue;
            }
        };

        // Aggregate and flag use the same profit value; nothing is re-read.
        unit.upsert_aggregate(&trade.account, profit)
            .await
            .map_err(|e| CycleError::new(CyclePhase::Upserting, Some(trade.id), e))?;

        unit.mark_processed(trade.id)
            .await
            .map_err(|e| CycleError::new(CyclePhase::Marking, Some(trade.id), e))?;

        debug!(trade_id = trade.id, account = %trade.account, profit = %profit, "trade applied");
        report.applied += 1;
        report.profit_applied = match report.profit_applied.checked_add(profit) {
            Some(total) => total,
            None => {
                warn!(trade_id = trade.id, "cycle profit total out of decimal range; report saturates");
                report.profit_applied.saturating_add(profit)
            }
        };
    }

    Ok(report)
}
