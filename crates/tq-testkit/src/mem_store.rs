use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tq_processor::{FetchedBatch, StoreError, TradeStore, UndecodableRow, UnitOfWork};
use tq_schemas::{AccountAggregate, NewTrade, TradeRecord};

// ---------------------------------------------------------------------------
// FaultPlan
// ---------------------------------------------------------------------------

/// Which store steps fail. Counters are 1-based and per unit of work:
/// `fail_upsert_at: Some(2)` fails the second upsert of every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_begin: bool,
    pub fail_fetch: bool,
    pub fail_upsert_at: Option<usize>,
    pub fail_mark_at: Option<usize>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemState {
    next_id: i64,
    trades: BTreeMap<i64, TradeRecord>,
    /// Rows that exist in the queue but cannot be decoded (id → reason).
    undecodable: BTreeMap<i64, String>,
    aggregates: BTreeMap<String, AccountAggregate>,
    commits: usize,
    rollbacks: usize,
}

impl MemState {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(op: &'static str) -> StoreError {
    StoreError::new(op, format!("injected {op} failure"))
}

// ---------------------------------------------------------------------------
// MemTradeStore
// ---------------------------------------------------------------------------

/// Cloning shares the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemTradeStore {
    state: Arc<Mutex<MemState>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl MemTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingestion side: append an unprocessed record, returning its id.
    pub fn enqueue(&self, trade: NewTrade) -> i64 {
        let mut st = lock(&self.state);
        let id = st.assign_id();
        st.trades.insert(id, trade.into_record(id));
        id
    }

    /// Append a row the store will report as undecodable.
    pub fn enqueue_undecodable(&self, reason: &str) -> i64 {
        let mut st = lock(&self.state);
        let id = st.assign_id();
        st.undecodable.insert(id, reason.to_string());
        id
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *lock(&self.faults) = plan;
    }

    pub fn clear_faults(&self) {
        self.set_faults(FaultPlan::default());
    }

    pub fn trade(&self, id: i64) -> Option<TradeRecord> {
        lock(&self.state).trades.get(&id).cloned()
    }

    pub fn aggregate(&self, account: &str) -> Option<AccountAggregate> {
        lock(&self.state).aggregates.get(account).cloned()
    }

    pub fn aggregates(&self) -> Vec<AccountAggregate> {
        lock(&self.state).aggregates.values().cloned().collect()
    }

    pub fn unprocessed_ids(&self) -> Vec<i64> {
        lock(&self.state)
            .trades
            .values()
            .filter(|t| !t.processed)
            .map(|t| t.id)
            .collect()
    }

    pub fn commits(&self) -> usize {
        lock(&self.state).commits
    }

    pub fn rollbacks(&self) -> usize {
        lock(&self.state).rollbacks
    }
}

impl TradeStore for MemTradeStore {
    type Unit = MemUnitOfWork;

    async fn begin(&self) -> Result<MemUnitOfWork, StoreError> {
        let faults = lock(&self.faults).clone();
        if faults.fail_begin {
            return Err(injected("begin"));
        }

        let st = lock(&self.state);
        Ok(MemUnitOfWork {
            state: Arc::clone(&self.state),
            faults,
            snapshot: st.trades.clone(),
            undecodable: st.undecodable.clone(),
            journal: Vec::new(),
            staged_processed: BTreeSet::new(),
            upserts: 0,
            marks: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// MemUnitOfWork
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Upsert { account: String, profit: Decimal },
    Mark { trade_id: i64 },
}

/// Reads come from the snapshot taken at `begin`; writes are journaled and
/// replayed onto shared state only by `commit`. Records enqueued after
/// `begin` are invisible to this unit and untouched by its commit.
///
/// `commit` fails without applying anything if a marked record was
/// processed by another unit in the meantime, or if an aggregate would
/// overflow.
#[derive(Debug)]
pub struct MemUnitOfWork {
    state: Arc<Mutex<MemState>>,
    faults: FaultPlan,
    snapshot: BTreeMap<i64, TradeRecord>,
    undecodable: BTreeMap<i64, String>,
    journal: Vec<Op>,
    staged_processed: BTreeSet<i64>,
    upserts: usize,
    marks: usize,
}

impl UnitOfWork for MemUnitOfWork {
    async fn fetch_unprocessed(&mut self) -> Result<FetchedBatch, StoreError> {
        if self.faults.fail_fetch {
            return Err(injected("fetch_unprocessed"));
        }

        let records = self
            .snapshot
            .values()
            .filter(|t| !t.processed && !self.staged_processed.contains(&t.id))
            .cloned()
            .collect();
        let undecodable = self
            .undecodable
            .iter()
            .map(|(id, reason)| UndecodableRow {
                id: Some(*id),
                reason: reason.clone(),
            })
            .collect();

        Ok(FetchedBatch {
            records,
            undecodable,
        })
    }

    async fn upsert_aggregate(&mut self, account: &str, profit: Decimal) -> Result<(), StoreError> {
        self.upserts += 1;
        if self.faults.fail_upsert_at == Some(self.upserts) {
            return Err(injected("upsert_aggregate"));
        }
        self.journal.push(Op::Upsert {
            account: account.to_string(),
            profit,
        });
        Ok(())
    }

    async fn mark_processed(&mut self, trade_id: i64) -> Result<(), StoreError> {
        self.marks += 1;
        if self.faults.fail_mark_at == Some(self.marks) {
            return Err(injected("mark_processed"));
        }

        let unprocessed = self
            .snapshot
            .get(&trade_id)
            .map(|t| !t.processed)
            .unwrap_or(false);
        if !unprocessed || !self.staged_processed.insert(trade_id) {
            return Err(StoreError::new(
                "mark_processed",
                format!("trade {trade_id}: expected 1 unprocessed row, found 0"),
            ));
        }

        self.journal.push(Op::Mark { trade_id });
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.faults.fail_commit {
            return Err(injected("commit"));
        }

        let mut st = lock(&self.state);

        // Another unit may have flipped a row since our snapshot; Postgres
        // would have matched zero rows for our update.
        for op in &self.journal {
            if let Op::Mark { trade_id } = op {
                let still_unprocessed = st.trades.get(trade_id).map(|t| !t.processed).unwrap_or(false);
                if !still_unprocessed {
                    return Err(StoreError::new(
                        "commit",
                        format!("trade {trade_id} was processed by a concurrent unit"),
                    ));
                }
            }
        }

        // Fold upserts into copies first so an overflow leaves nothing applied.
        let mut touched: BTreeMap<String, AccountAggregate> = BTreeMap::new();
        for op in &self.journal {
            if let Op::Upsert { account, profit } = op {
                if let Some(agg) = touched.get_mut(account) {
                    agg.apply(*profit).map_err(|e| StoreError::new("commit", e))?;
                    continue;
                }
                let agg = match st.aggregates.get(account) {
                    Some(existing) => {
                        let mut agg = existing.clone();
                        agg.apply(*profit).map_err(|e| StoreError::new("commit", e))?;
                        agg
                    }
                    None => AccountAggregate::first(account.clone(), *profit),
                };
                touched.insert(account.clone(), agg);
            }
        }

        st.aggregates.extend(touched);
        for op in &self.journal {
            if let Op::Mark { trade_id } = op {
                if let Some(t) = st.trades.get_mut(trade_id) {
                    t.processed = true;
                }
            }
        }
        st.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        if self.faults.fail_rollback {
            return Err(injected("rollback"));
        }
        lock(&self.state).rollbacks += 1;
        Ok(())
    }
}
