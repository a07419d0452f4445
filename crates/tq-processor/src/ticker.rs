//! Cycle triggers.
//!
//! A [`Ticker`] yields `Some(Tick)` when the next cycle should run and
//! `None` when the schedule is over. The loop only asks for the next tick
//! after the previous cycle has fully returned, so a sleeping ticker measures
//! its interval from the end of the last cycle, never from its start.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick counter.
    pub seq: u64,
}

pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = Option<Tick>> + Send;
}

// ---------------------------------------------------------------------------
// SleepTicker
// ---------------------------------------------------------------------------

/// Production ticker: first tick immediately, then one tick per `interval`
/// of sleep. Never ends.
#[derive(Debug)]
pub struct SleepTicker {
    interval: Duration,
    seq: u64,
}

impl SleepTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, seq: 0 }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Ticker for SleepTicker {
    async fn tick(&mut self) -> Option<Tick> {
        if self.seq > 0 {
            tokio::time::sleep(self.interval).await;
        }
        self.seq += 1;
        Some(Tick { seq: self.seq })
    }
}

// ---------------------------------------------------------------------------
// ManualTicker
// ---------------------------------------------------------------------------

/// Channel-driven ticker. Each [`TickHandle::fire`] releases one tick; the
/// schedule ends once every handle is dropped and queued ticks are drained.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl TickHandle {
    /// Queue one tick. Returns false if the ticker is gone.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl ManualTicker {
    pub fn channel() -> (TickHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickHandle { tx }, Self { rx, seq: 0 })
    }

    /// A ticker that yields exactly `n` ticks and then ends.
    pub fn with_ticks(n: usize) -> Self {
        let (handle, ticker) = Self::channel();
        for _ in 0..n {
            handle.fire();
        }
        ticker
    }
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<Tick> {
        self.rx.recv().await?;
        self.seq += 1;
        Some(Tick { seq: self.seq })
    }
}
