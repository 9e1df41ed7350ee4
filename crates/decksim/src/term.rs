//! A deck simulated on the terminal: presses come from stdin lines and tile
//! writes are logged (and optionally dumped as PNG files).

use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use deckd_engine::{Device, DeviceError, DeviceResult, InputEvent};
use image::RgbaImage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info, warn};

/// Highest brightness accepted by the simulated panel.
const MAX_BRIGHTNESS: u8 = 100;

/// One parsed line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Nothing to do (blank line or `#` comment).
    Blank,
    /// Input events to deliver in order.
    Events(Vec<InputEvent>),
    /// End the input stream.
    Quit,
}

/// Parse `press N`, `release N`, `tap N` or `quit` for a deck of `tiles` keys.
pub fn parse_line(line: &str, tiles: usize) -> Result<Line, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Blank);
    }
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    if matches!(verb, "quit" | "exit") {
        return Ok(Line::Quit);
    }
    let index = match (parts.next(), parts.next()) {
        (Some(n), None) => n
            .parse::<usize>()
            .map_err(|_| format!("not a tile index: {n:?}"))?,
        _ => return Err(format!("expected `{verb} N`")),
    };
    if index >= tiles {
        return Err(format!("tile {index} is outside 0..{tiles}"));
    }
    match verb {
        "press" | "p" => Ok(Line::Events(vec![InputEvent::press(index)])),
        "release" | "r" => Ok(Line::Events(vec![InputEvent::release(index)])),
        "tap" | "t" => Ok(Line::Events(vec![
            InputEvent::press(index),
            InputEvent::release(index),
        ])),
        other => Err(format!("unknown command {other:?}")),
    }
}

/// Terminal-backed [`Device`].
pub struct TermDevice {
    /// Tile edge length in pixels.
    pixel_size: u32,
    /// Key columns.
    cols: u32,
    /// Key rows.
    rows: u32,
    /// Directory receiving `tile-<index>.png` copies of each write.
    dump_dir: Option<PathBuf>,
    /// Cleared once the engine reports a disconnect.
    open: AtomicBool,
    /// Set by the first `read_events` call.
    input_claimed: AtomicBool,
}

impl TermDevice {
    /// Create an open device with a `cols` x `rows` grid of `pixel_size` tiles.
    pub fn new(pixel_size: u32, cols: u32, rows: u32, dump_dir: Option<PathBuf>) -> Self {
        Self {
            pixel_size,
            cols,
            rows,
            dump_dir,
            open: AtomicBool::new(true),
            input_claimed: AtomicBool::new(false),
        }
    }

    /// Number of addressable tiles.
    fn tiles(&self) -> usize {
        (self.cols as usize).saturating_mul(self.rows as usize)
    }
}

#[async_trait]
impl Device for TermDevice {
    fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    fn cols(&self) -> u32 {
        self.cols
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn write_tile(&self, index: usize, image: &RgbaImage) -> DeviceResult<()> {
        if !self.is_open() {
            return Err(DeviceError::Transport("deck closed".into()));
        }
        if index >= self.tiles() {
            return Err(DeviceError::Rejected(format!("no tile {index}")));
        }
        info!(
            tile = index,
            width = image.width(),
            height = image.height(),
            "tile_written"
        );
        let Some(dir) = &self.dump_dir else {
            return Ok(());
        };
        let path = dir.join(format!("tile-{index}.png"));
        let img = image.clone();
        let saved = tokio::task::spawn_blocking(move || img.save(&path))
            .await
            .map_err(|e| DeviceError::Rejected(e.to_string()))?;
        saved.map_err(|e| DeviceError::Rejected(format!("tile dump failed: {e}")))
    }

    async fn set_brightness(&self, level: u8) -> DeviceResult<()> {
        if level > MAX_BRIGHTNESS {
            return Err(DeviceError::Rejected(format!(
                "brightness {level} exceeds {MAX_BRIGHTNESS}"
            )));
        }
        info!(level, "brightness_set");
        Ok(())
    }

    fn read_events(&self) -> DeviceResult<mpsc::Receiver<InputEvent>> {
        if self.input_claimed.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::Transport("input already claimed".into()));
        }
        let (tx, rx) = mpsc::channel(32);
        let tiles = self.tiles();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse_line(&line, tiles) {
                    Ok(Line::Blank) => {}
                    Ok(Line::Quit) => break,
                    Ok(Line::Events(events)) => {
                        for ev in events {
                            if tx.send(ev).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(msg) => warn!("{}", msg),
                }
            }
            debug!("stdin_closed");
        });
        Ok(rx)
    }

    fn on_disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
        info!("deck_closed");
    }
}
