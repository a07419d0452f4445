use tracing::{debug, error, info};

use crate::cycle::QueueProcessor;
use crate::store::TradeStore;
use crate::ticker::Ticker;

/// Totals over the life of one loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub failures: u64,
    pub applied: u64,
}

/// Run one cycle per tick until the ticker ends.
///
/// Cycles are strictly sequential. A failed cycle is logged and counted; the
/// loop itself never stops on a cycle error.
pub async fn run_loop<S, T>(processor: &QueueProcessor<S>, ticker: &mut T) -> LoopSummary
where
    S: TradeStore,
    T: Ticker,
{
    let mut summary = LoopSummary::default();

    while let Some(tick) = ticker.tick().await {
        summary.cycles += 1;

        match processor.run_cycle().await {
            Ok(report) if report.is_empty() => {
                debug!(seq = tick.seq, "cycle committed; queue empty");
            }
            Ok(report) => {
                summary.applied += report.applied as u64;
                info!(
                    seq = tick.seq,
                    fetched = report.fetched,
                    applied = report.applied,
                    skipped_invalid = report.skipped_invalid,
                    skipped_undecodable = report.skipped_undecodable,
                    profit = %report.profit_applied,
                    "cycle committed"
                );
            }
            Err(err) => {
                summary.failures += 1;
                error!(
                    seq = tick.seq,
                    phase = %err.phase,
                    trade_id = ?err.trade_id,
                    error = %err,
                    "cycle failed; rolled back, retrying next tick"
                );
            }
        }
    }

    info!(
        cycles = summary.cycles,
        failures = summary.failures,
        applied = summary.applied,
        "processor loop finished"
    );
    summary
}
