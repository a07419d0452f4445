//! Test support for the trade queue.
//!
//! [`MemTradeStore`] is an in-memory [`tq_processor::TradeStore`] with the
//! same transactional contract as the Postgres store (snapshot reads,
//! journaled writes applied only on commit) plus a [`FaultPlan`] for
//! injecting store failures at chosen steps.

mod fixtures;
mod mem_store;

pub use fixtures::{dec, new_trade, reference_trade};
pub use mem_store::{FaultPlan, MemTradeStore, MemUnitOfWork};
