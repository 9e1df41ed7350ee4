//! Counter icon producer and the key action that bumps it.

use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use config::KeyConfig;
use embedded_graphics::pixelcolor::Rgb888;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{FrameSink, IconHandler, KeyHandler};
use crate::{DeviceInfo, Key, render, ticker::spawn_ticker};

/// Draws a count on the tile, redrawing on a timer.
#[derive(Debug)]
pub struct CounterIcon {
    /// Shared with the ticker task.
    count: Arc<AtomicU64>,
    /// Redraw period.
    interval: Duration,
    /// Text color.
    color: Rgb888,
    /// Stops the ticker.
    token: CancellationToken,
}

impl CounterIcon {
    /// A counter starting at zero.
    pub fn new(interval: Duration, color: Rgb888) -> Self {
        Self {
            count: Arc::new(AtomicU64::new(0)),
            interval,
            color,
            token: CancellationToken::new(),
        }
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Add one; the next redraw shows the new value.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IconHandler for CounterIcon {
    fn start(&self, _key: &KeyConfig, info: &DeviceInfo, sink: FrameSink) {
        let count = self.count.clone();
        let px = info.pixel_size;
        let color = self.color;
        spawn_ticker("counter", self.token.clone(), self.interval, move || {
            let text = count.load(Ordering::Relaxed).to_string();
            let frame = Arc::new(render::text_tile(&text, px, color));
            let sink = sink.clone();
            async move { sink.emit(frame).await }
        });
    }

    fn stop(&self) {
        self.token.cancel();
    }

    fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Press action that bumps the key's own `Counter` producer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterKey;

impl KeyHandler for CounterKey {
    fn on_press(&self, key: &Key, _info: &DeviceInfo) {
        let counter = key
            .icon_handler()
            .and_then(|h| h.as_any().downcast_ref::<CounterIcon>());
        match counter {
            Some(c) => {
                let n = c.increment();
                debug!(count = n, "counter_incremented");
            }
            None => debug!("counter key without a counter icon; ignoring press"),
        }
    }
}

#[cfg(test)]
mod tests {
    use embedded_graphics::pixelcolor::RgbColor;

    use super::*;

    fn info() -> DeviceInfo {
        DeviceInfo {
            pixel_size: 32,
            cols: 5,
            rows: 3,
            page: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_current_count_until_stopped() {
        let icon = CounterIcon::new(Duration::from_millis(10), Rgb888::WHITE);
        let (sink, mut rx) = FrameSink::channel(1);
        icon.start(&KeyConfig::default(), &info(), sink);

        let first = rx.recv().await.unwrap();
        assert_eq!(*first, render::text_tile("0", 32, Rgb888::WHITE));

        icon.increment();
        let mut saw_one = false;
        for _ in 0..5 {
            let frame = rx.recv().await.unwrap();
            if *frame == render::text_tile("1", 32, Rgb888::WHITE) {
                saw_one = true;
                break;
            }
        }
        assert!(saw_one);

        icon.stop();
        assert!(!icon.is_running());
        // One queued frame plus one blocked emit may still drain, then the channel closes.
        let mut remaining = 0;
        while rx.recv().await.is_some() {
            remaining += 1;
        }
        assert!(remaining <= 2);
    }

    #[test]
    fn counter_key_without_counter_icon_is_noop() {
        let key = Key::new(KeyConfig::default());
        CounterKey.on_press(&key, &info());
        assert!(key.icon_handler().is_none());
    }
}
