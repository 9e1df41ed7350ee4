//! Engine tunables.

use std::time::Duration;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

/// Default command prefix used to inject keystrokes.
pub const DEFAULT_KEYBIND_COMMAND: &str = "xdotool key";
/// Default command prefix used to open URLs.
pub const DEFAULT_URL_COMMAND: &str = "xdg-open";
/// Default redraw period of the counter producer.
pub const DEFAULT_COUNTER_INTERVAL_MS: u64 = 250;
/// Default redraw period of the clock producer.
pub const DEFAULT_CLOCK_INTERVAL_MS: u64 = 1000;
/// Default number of producer frames queued per key before the producer waits.
pub const DEFAULT_FRAME_QUEUE: usize = 1;

/// Runtime tunables for the engine and its built-in handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCfg {
    /// Prefix for keybind presses; the keybind string is appended.
    pub keybind_command: String,
    /// Prefix for URL presses; the URL is appended.
    pub url_command: String,
    /// How often the `Counter` producer redraws.
    pub counter_interval: Duration,
    /// How often the `Time` producer redraws.
    pub clock_interval: Duration,
    /// Color of overlay text.
    pub text_color: Rgb888,
    /// Frames buffered between a producer and the device writer.
    pub frame_queue: usize,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            keybind_command: DEFAULT_KEYBIND_COMMAND.to_string(),
            url_command: DEFAULT_URL_COMMAND.to_string(),
            counter_interval: Duration::from_millis(DEFAULT_COUNTER_INTERVAL_MS),
            clock_interval: Duration::from_millis(DEFAULT_CLOCK_INTERVAL_MS),
            text_color: Rgb888::WHITE,
            frame_queue: DEFAULT_FRAME_QUEUE,
        }
    }
}
