//! Store seam: the transactional boundary a cycle runs inside.
//!
//! A [`TradeStore`] opens one [`UnitOfWork`] per cycle. Every read and
//! write of the cycle goes through that unit; nothing is visible to other
//! readers until [`UnitOfWork::commit`], and [`UnitOfWork::rollback`] (or
//! dropping the unit) discards all of it.

use std::future::Future;

use rust_decimal::Decimal;
use tq_schemas::TradeRecord;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A read, write or commit the store could not execute.
#[derive(Debug, thiserror::Error)]
#[error("store {op} failed: {source}")]
pub struct StoreError {
    /// Short operation name, e.g. `"begin"`, `"mark_processed"`.
    pub op: &'static str,
    #[source]
    pub source: BoxError,
}

impl StoreError {
    pub fn new(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

/// A queue row that exists but could not be decoded into a [`TradeRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodableRow {
    pub id: Option<i64>,
    pub reason: String,
}

/// Result of reading the unprocessed queue inside a unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedBatch {
    pub records: Vec<TradeRecord>,
    pub undecodable: Vec<UndecodableRow>,
}

pub trait TradeStore: Send + Sync {
    type Unit: UnitOfWork;

    /// Open a unit of work with at least read-committed isolation.
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, StoreError>> + Send;
}

pub trait UnitOfWork: Send + Sized {
    /// All records with `processed = false` as seen by this unit.
    fn fetch_unprocessed(&mut self) -> impl Future<Output = Result<FetchedBatch, StoreError>> + Send;

    /// Create the account's aggregate with `trades = 1, profit = profit`, or
    /// add one trade and `profit` to the existing one.
    fn upsert_aggregate(
        &mut self,
        account: &str,
        profit: Decimal,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Flip one record to processed. Must affect exactly one unprocessed row.
    fn mark_processed(&mut self, trade_id: i64) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
