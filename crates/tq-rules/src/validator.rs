use rust_decimal::Decimal;
use tq_schemas::{Side, TradeRecord};

/// The first business rule a trade record breaks.
///
/// Rules are checked in a fixed order (account, symbol, volume, open, close,
/// side) so the reported violation is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("account must not be empty")]
    EmptyAccount,
    #[error("symbol {0:?} must be exactly six uppercase ASCII letters")]
    BadSymbol(String),
    #[error("volume must be > 0, got {0}")]
    NonPositiveVolume(Decimal),
    #[error("open price must be > 0, got {0}")]
    NonPositiveOpen(Decimal),
    #[error("close price must be > 0, got {0}")]
    NonPositiveClose(Decimal),
    #[error("side {0:?} must be one of: buy, sell")]
    BadSide(String),
}

/// A trade record that passed every rule. Only this type can be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTrade {
    pub id: i64,
    pub account: String,
    pub symbol: String,
    pub volume: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub side: Side,
}

/// Check a queued record against the business rules.
pub fn validate(t: &TradeRecord) -> Result<ValidatedTrade, Violation> {
    if t.account.is_empty() {
        return Err(Violation::EmptyAccount);
    }
    if !is_valid_symbol(&t.symbol) {
        return Err(Violation::BadSymbol(t.symbol.clone()));
    }
    if t.volume <= Decimal::ZERO {
        return Err(Violation::NonPositiveVolume(t.volume));
    }
    if t.open <= Decimal::ZERO {
        return Err(Violation::NonPositiveOpen(t.open));
    }
    if t.close <= Decimal::ZERO {
        return Err(Violation::NonPositiveClose(t.close));
    }
    let side = Side::parse(&t.side).ok_or_else(|| Violation::BadSide(t.side.clone()))?;

    Ok(ValidatedTrade {
        id: t.id,
        account: t.account.clone(),
        symbol: t.symbol.clone(),
        volume: t.volume,
        open: t.open,
        close: t.close,
        side,
    })
}

/// Exactly six ASCII uppercase letters, e.g. `EURUSD`.
pub fn is_valid_symbol(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_uppercase())
}
