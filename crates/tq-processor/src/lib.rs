//! tq-processor
//!
//! The trade-queue processor: one atomic cycle over all unprocessed trade
//! records (validate, score, upsert aggregate, mark processed, commit), and
//! the tick-driven loop that repeats it.
//!
//! Storage is behind [`TradeStore`] / [`UnitOfWork`]; scheduling is behind
//! [`Ticker`]. Neither the cycle nor the loop knows about Postgres or wall
//! clocks.

mod cycle;
mod run_loop;
mod store;
mod ticker;

pub use cycle::{CycleError, CyclePhase, CycleReport, QueueProcessor};
pub use run_loop::{run_loop, LoopSummary};
pub use store::{BoxError, FetchedBatch, StoreError, TradeStore, UndecodableRow, UnitOfWork};
pub use ticker::{ManualTicker, SleepTicker, Tick, TickHandle, Ticker};
