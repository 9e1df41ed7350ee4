//! Wall-clock icon producer.

use std::{any::Any, sync::Arc, time::Duration};

use chrono::Local;
use config::KeyConfig;
use embedded_graphics::pixelcolor::Rgb888;
use tokio_util::sync::CancellationToken;

use super::{FrameSink, IconHandler};
use crate::{DeviceInfo, render, ticker::spawn_ticker};

/// `strftime` layout of the clock face: time above date.
pub const CLOCK_FORMAT: &str = "%H:%M:%S\n%d-%m-%y";

/// Draws the local wall-clock time, redrawing on a timer.
#[derive(Debug)]
pub struct ClockIcon {
    /// Redraw period.
    interval: Duration,
    /// Text color.
    color: Rgb888,
    /// Stops the ticker.
    token: CancellationToken,
}

impl ClockIcon {
    /// A clock redrawn every `interval`.
    pub fn new(interval: Duration, color: Rgb888) -> Self {
        Self {
            interval,
            color,
            token: CancellationToken::new(),
        }
    }
}

impl IconHandler for ClockIcon {
    fn start(&self, _key: &KeyConfig, info: &DeviceInfo, sink: FrameSink) {
        let px = info.pixel_size;
        let color = self.color;
        spawn_ticker("clock", self.token.clone(), self.interval, move || {
            let now = Local::now().format(CLOCK_FORMAT).to_string();
            let frame = Arc::new(render::text_tile(&now, px, color));
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
