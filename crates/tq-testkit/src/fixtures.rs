use rust_decimal::Decimal;
use tq_schemas::NewTrade;

/// Parse a decimal literal; invalid fixtures yield zero, which every
/// validator rule on amounts rejects.
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap_or(Decimal::ZERO)
}

pub fn new_trade(account: &str, symbol: &str, side: &str, volume: &str, open: &str, close: &str) -> NewTrade {
    NewTrade {
        account: account.to_string(),
        symbol: symbol.to_string(),
        volume: dec(volume),
        open: dec(open),
        close: dec(close),
        side: side.to_string(),
    }
}

/// EURUSD buy, volume 1.0, 1.1000 → 1.1050: profit 500.
pub fn reference_trade(account: &str) -> NewTrade {
    new_trade(account, "EURUSD", "buy", "1.0", "1.1000", "1.1050")
}
