//! Shared entity types for the trade queue.
//!
//! `TradeRecord` is a row of the `trades_q` queue exactly as the store holds
//! it: fields are raw and unvalidated because ingestion and processing are
//! separate writers. `AccountAggregate` is the running per-account total the
//! processor maintains.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trade records
// ---------------------------------------------------------------------------

/// One queued trade execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Store-assigned, monotonically increasing id.
    pub id: i64,
    pub account: String,
    pub symbol: String,
    pub volume: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    /// Raw side string; only `"buy"` and `"sell"` survive validation.
    pub side: String,
    pub processed: bool,
}

/// A trade as submitted by the ingestion boundary, before the store assigns
/// an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrade {
    pub account: String,
    pub symbol: String,
    pub volume: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub side: String,
}

impl NewTrade {
    /// Materialize as an unprocessed queue row with the given id.
    pub fn into_record(self, id: i64) -> TradeRecord {
        TradeRecord {
            id,
            account: self.account,
            symbol: self.symbol,
            volume: self.volume,
            open: self.open,
            close: self.close,
            side: self.side,
            processed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Exact, case-sensitive match on the wire spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Account aggregates
// ---------------------------------------------------------------------------

/// Adding a trade would take an aggregate past the `i64` count or the
/// `Decimal` range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("aggregate for account {account:?} overflows")]
pub struct AggregateOverflow {
    pub account: String,
}

/// Running totals for one account: how many trades were applied and their
/// summed signed profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAggregate {
    pub account: String,
    pub trades: i64,
    pub profit: Decimal,
}

impl AccountAggregate {
    /// Aggregate created by the first contributing trade.
    pub fn first(account: impl Into<String>, profit: Decimal) -> Self {
        Self {
            account: account.into(),
            trades: 1,
            profit,
        }
    }

    /// Fold one more trade's profit into the totals. On overflow the
    /// aggregate is left unchanged.
    pub fn apply(&mut self, profit: Decimal) -> Result<(), AggregateOverflow> {
        match (self.trades.checked_add(1), self.profit.checked_add(profit)) {
            (Some(trades), Some(total)) => {
                self.trades = trades;
                self.profit = total;
                Ok(())
            }
            _ => Err(AggregateOverflow {
                account: self.account.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parse_is_case_sensitive() {
        assert_eq!(Side::parse("buy"), Some(Side::Buy));
        assert_eq!(Side::parse("sell"), Some(Side::Sell));
        assert_eq!(Side::parse("BUY"), None);
        assert_eq!(Side::parse(""), None);
    }

    #[test]
    fn side_serializes_lowercase() {
        let s = serde_json::to_string(&Side::Sell).unwrap();
        assert_eq!(s, "\"sell\"");
    }

    #[test]
    fn aggregate_first_then_apply() {
        let mut agg = AccountAggregate::first("acc1", Decimal::new(500, 0));
        assert_eq!(agg.trades, 1);

        agg.apply(Decimal::new(-200, 0)).unwrap();
        assert_eq!(agg.trades, 2);
        assert_eq!(agg.profit, Decimal::new(300, 0));
    }

    #[test]
    fn aggregate_overflow_is_an_error_not_a_clamp() {
        let mut agg = AccountAggregate::first("x", Decimal::MAX);
        let err = agg.apply(Decimal::ONE).unwrap_err();
        assert_eq!(err.account, "x");
        assert_eq!(agg.trades, 1, "count must not move on overflow");
        assert_eq!(agg.profit, Decimal::MAX);

        // the exact sum is still fine going the other way
        agg.apply(-Decimal::MAX).unwrap();
        assert_eq!((agg.trades, agg.profit), (2, Decimal::ZERO));
    }

    #[test]
    fn new_trade_becomes_unprocessed_record() {
        let t = NewTrade {
            account: "acc1".to_string(),
            symbol: "EURUSD".to_string(),
            volume: Decimal::ONE,
            open: Decimal::new(11000, 4),
            close: Decimal::new(11050, 4),
            side: "buy".to_string(),
        };
        let r = t.into_record(7);
        assert_eq!(r.id, 7);
        assert!(!r.processed);
        assert_eq!(r.symbol, "EURUSD");
    }
}
