//! tq-rules
//!
//! Trade validation and profit scoring.
//!
//! Deterministic, pure logic. No IO, no time, no store calls.

mod profit;
mod validator;

pub use profit::{profit, ProfitOverflow, CONTRACT_SIZE};
pub use validator::{is_valid_symbol, validate, ValidatedTrade, Violation};
