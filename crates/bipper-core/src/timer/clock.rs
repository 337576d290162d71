//! Tick sources for the countdown engine.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Where the engine's ticks come from.
#[derive(Debug)]
pub enum Clock {
    /// Wall-clock ticks, one per `period`, starting one period after the
    /// first wait. Built lazily so the clock can be created outside a runtime.
    Interval {
        period: Duration,
        interval: Option<Interval>,
    },
    /// Ticks fed by a [`ManualTicker`].
    Manual(mpsc::Receiver<()>),
}

impl Clock {
    pub fn every(period: Duration) -> Self {
        Clock::Interval {
            period,
            interval: None,
        }
    }

    /// The one-second clock used for real countdowns.
    pub fn seconds() -> Self {
        Self::every(Duration::from_secs(1))
    }

    /// A clock that only ticks when told to.
    pub fn manual() -> (Self, ManualTicker) {
        let (tx, rx) = mpsc::channel(1);
        (Clock::Manual(rx), ManualTicker { tx })
    }

    /// Wait for the next tick. Returns `false` when the clock can never
    /// tick again.
    pub async fn tick(&mut self) -> bool {
        match self {
            Clock::Interval { period, interval } => {
                let period = *period;
                let interval = interval.get_or_insert_with(|| {
                    let mut i = tokio::time::interval_at(Instant::now() + period, period);
                    // A stalled observer delays ticks instead of bursting them.
                    i.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    i
                });
                interval.tick().await;
                true
            }
            Clock::Manual(rx) => rx.recv().await.is_some(),
        }
    }
}

/// Drives a [`Clock::manual`] clock.
#[derive(Debug, Clone)]
pub struct ManualTicker {
    tx: mpsc::Sender<()>,
}

impl ManualTicker {
    /// Deliver one tick and wait until the engine has taken it.
    ///
    /// Returns `false` if the engine is gone.
    pub async fn tick(&self) -> bool {
        if self.tx.send(()).await.is_err() {
            return false;
        }
        // The slot frees up once the engine has received the tick.
        self.tx.reserve().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_waits_one_period_before_first_tick() {
        let mut clock = Clock::seconds();
        let start = Instant::now();
        assert!(clock.tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(clock.tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn manual_clock_ticks_on_demand() {
        let (mut clock, ticker) = Clock::manual();
        let driver = tokio::spawn(async move {
            assert!(ticker.tick().await);
            assert!(ticker.tick().await);
        });
        assert!(clock.tick().await);
        assert!(clock.tick().await);
        driver.await.unwrap();
        assert!(!clock.tick().await);
    }
}
