use rust_decimal::Decimal;
use tq_schemas::Side;

use crate::validator::ValidatedTrade;

/// Units per lot: converts price delta × volume into a profit amount.
pub const CONTRACT_SIZE: i64 = 100_000;

/// The profit computation left the representable `Decimal` range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("profit for trade {trade_id} overflows the decimal range")]
pub struct ProfitOverflow {
    pub trade_id: i64,
}

/// Signed profit of a validated trade.
///
/// `(close - open) * volume * CONTRACT_SIZE`, negated for sells. No rounding
/// beyond `Decimal`'s native precision.
pub fn profit(t: &ValidatedTrade) -> Result<Decimal, ProfitOverflow> {
    let raw = t
        .close
        .checked_sub(t.open)
        .and_then(|delta| delta.checked_mul(t.volume))
        .and_then(|v| v.checked_mul(Decimal::from(CONTRACT_SIZE)))
        .ok_or(ProfitOverflow { trade_id: t.id })?;

    Ok(match t.side {
        Side::Buy => raw,
        Side::Sell => -raw,
    })
}
