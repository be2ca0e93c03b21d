//! Fixed-interval polling backstop.
//!
//! Guarantees the snapshot is at most one interval stale even when push
//! delivery is degraded or absent. The first tick fires one interval after
//! start; the initial load is issued eagerly by the coordinator.

use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::config::clamp_poll_interval;
use super::worker::RefreshTrigger;

/// Periodically requests a silent refresh until stopped.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    handle: JoinHandle<()>,
}

impl PollScheduler {
    pub fn start(period: Duration, trigger: RefreshTrigger) -> Self {
        let period = clamp_poll_interval(period);

        let handle = tokio::spawn(async move {
            info!("Portfolio poll scheduler started ({}s interval)", period.as_secs());

            let mut ticker = interval_at(Instant::now() + period, period);
            // A slow refresh postpones the next tick instead of bunching them up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!("Poll interval elapsed, requesting silent refresh");
                if !trigger.silent() {
                    debug!("Refresh worker gone, poll scheduler exiting");
                    return;
                }
            }
        });

        Self { period, handle }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::sync::test_support::{active_worker, CountingSource};
    use crate::sync::worker::RefreshWorker;

    fn setup() -> (Arc<CountingSource>, RefreshWorker, RefreshTrigger) {
        let source = Arc::new(CountingSource::default());
        let (_store, trigger, worker) = active_worker(source.clone());
        (source, worker, trigger)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_once_per_interval() {
        let (source, _worker, trigger) = setup();
        let _poller = PollScheduler::start(Duration::from_secs(30), trigger);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(source.fetches(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.fetches(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_interval_is_clamped() {
        let (source, _worker, trigger) = setup();
        let poller = PollScheduler::start(Duration::from_secs(1), trigger);
        assert_eq!(poller.period(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(source.fetches(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_ticks() {
        let (source, _worker, trigger) = setup();
        let poller = PollScheduler::start(Duration::from_secs(10), trigger);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(source.fetches(), 1);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetches(), 1);
    }
}
