//! Periodic emission loop shared by timer-driven icon producers.
//!
//! A ticker runs its callback immediately and then on each interval tick
//! until its token is cancelled or the callback reports that its sink is gone.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Spawn a ticker task named `name` for logging.
///
/// `on_tick` returns a future resolving to `false` when no further ticks are
/// wanted. Cancellation is checked before every emission, so a stop takes
/// effect no later than the next tick.
pub(crate) fn spawn_ticker<F, Fut>(
    name: &'static str,
    token: CancellationToken,
    interval: Duration,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        trace!(ticker = name, int_ms = interval.as_millis(), "ticker_start");
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(ticker = name, "ticker_cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if token.is_cancelled() {
                        return;
                    }
                    if !on_tick().await {
                        trace!(ticker = name, "ticker_sink_closed");
                        return;
                    }
                }
            }
        }
    })
}
