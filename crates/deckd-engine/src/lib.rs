//! deckd Engine
//!
//! The engine drives a multi-button display deck:
//! - renders each key's icon (image file, optional text) and writes it to its tile
//! - tracks the visible page and discards frames for pages no longer shown
//! - runs pluggable icon producers (animations, counters, clocks)
//! - reads presses and dispatches the key's configured actions
//!
//! Construct an [`Engine`] over a [`Device`] and a [`CommandRunner`], call
//! [`Engine::activate_page`] to show the first page, then drive
//! [`Engine::listen`] until the device goes away.
use std::sync::Arc;

mod cfg;
mod deps;
mod error;
pub mod handlers;
mod key;
mod notification;
pub mod render;
mod session;
#[cfg(feature = "test-support")]
pub mod test_support;
mod ticker;
mod writer;

use config::Deck;
use image::RgbaImage;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, trace, warn};

pub use cfg::{
    DEFAULT_CLOCK_INTERVAL_MS, DEFAULT_COUNTER_INTERVAL_MS, DEFAULT_FRAME_QUEUE,
    DEFAULT_KEYBIND_COMMAND, DEFAULT_URL_COMMAND, EngineCfg,
};
pub use deps::{CommandRunner, Device, DeviceInfo, InputEvent, ShellRunner};
pub use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
pub use error::{DeviceError, DeviceResult, Error, Result};
pub use handlers::{FrameSink, HandlerRegistry, IconHandler, KeyHandler};
pub use key::{DeckState, Key};
pub use notification::{EngineEvent, Notifier};
pub use session::Session;
pub use writer::{PushOutcome, TileWriter};

/// Engine coordinates page state, tile rendering, icon producers and press dispatch.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Engine {
    /// Runtime keys for every page.
    deck: Arc<DeckState>,
    /// Visible page, link status and write gate.
    session: Arc<Session>,
    /// Device connection.
    device: Arc<dyn Device>,
    /// Serialized tile writes.
    writer: TileWriter,
    /// Handler constructors by kind name.
    registry: Arc<HandlerRegistry>,
    /// Launches commands, keybinds and URLs.
    runner: Arc<dyn CommandRunner>,
    /// Page change / disconnect events.
    notifier: Notifier,
    /// Tunables.
    cfg: Arc<EngineCfg>,
}

impl Engine {
    /// Create an engine with default tunables and the built-in handlers.
    pub fn new(
        deck: Deck,
        device: Arc<dyn Device>,
        runner: Arc<dyn CommandRunner>,
        event_tx: UnboundedSender<EngineEvent>,
    ) -> Self {
        let cfg = EngineCfg::default();
        let registry = HandlerRegistry::with_builtins(&cfg);
        Self::new_with_parts(deck, device, runner, event_tx, cfg, registry)
    }

    /// Create an engine with explicit tunables and handler registry.
    pub fn new_with_parts(
        deck: Deck,
        device: Arc<dyn Device>,
        runner: Arc<dyn CommandRunner>,
        event_tx: UnboundedSender<EngineEvent>,
        cfg: EngineCfg,
        registry: HandlerRegistry,
    ) -> Self {
        let session = Arc::new(Session::new(device.is_open()));
        let notifier = Notifier::new(event_tx);
        let writer = TileWriter::new(device.clone(), session.clone(), notifier.clone());
        Self {
            deck: Arc::new(DeckState::new(deck)),
            session,
            device,
            writer,
            registry: Arc::new(registry),
            runner,
            notifier,
            cfg: Arc::new(cfg),
        }
    }

    /// Shared session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runtime keys.
    pub fn deck(&self) -> &DeckState {
        &self.deck
    }

    /// Device facts as seen by handlers on `page`.
    pub fn device_info(&self, page: usize) -> DeviceInfo {
        DeviceInfo {
            pixel_size: self.device.pixel_size(),
            cols: self.device.cols(),
            rows: self.device.rows(),
            page,
        }
    }

    /// Make `page` visible and start one render task per key on it.
    ///
    /// Returns without waiting for any render. Frames still in flight for
    /// the previous page are discarded when they reach the write gate.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime; render tasks are spawned
    /// onto the current one.
    pub fn activate_page(&self, page: usize) -> Result<()> {
        let Some(keys) = self.deck.page(page) else {
            return Err(Error::PageOutOfRange(page));
        };
        self.session.set_page(page);
        for (tile, key) in keys.iter().enumerate() {
            let engine = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                engine.render_or_restore(key, tile, page).await;
            });
        }
        info!(page, keys = keys.len(), "page_activated");
        self.notifier.page_changed(page);
        Ok(())
    }

    /// Show `key` on `tile`: re-push a cached image, render and push a static
    /// one, or attach and start its icon producer.
    async fn render_or_restore(&self, key: Arc<Key>, tile: usize, page: usize) {
        if let Some(img) = key.cached_image() {
            self.writer.push(&img, tile, page).await;
            return;
        }
        let Some(kind) = key.config().icon_handler() else {
            let px = self.device.pixel_size();
            let color = self.cfg.text_color;
            let k = key.clone();
            let rendered =
                tokio::task::spawn_blocking(move || render::render_key_image(&k, px, color)).await;
            match rendered {
                Ok(Ok(img)) => {
                    self.writer.push(&img, tile, page).await;
                }
                Ok(Err(e)) => warn!(page, tile, "Key render failed: {}", e),
                Err(e) => warn!(page, tile, error = %e, "render task failed"),
            }
            return;
        };
        if key.icon_handler().is_some() {
            // Producer already running; its frames resume reaching the device now.
            trace!(page, tile, "icon_handler_attached");
            return;
        }
        self.start_icon_handler(&key, kind, tile, page);
    }

    /// Construct, attach and start an icon producer for `key`.
    fn start_icon_handler(&self, key: &Key, kind: &str, tile: usize, page: usize) {
        let handler = match self.registry.icon(kind) {
            Ok(h) => h,
            Err(e) => {
                debug!(page, tile, "{}", e);
                return;
            }
        };
        if !key.attach_icon_handler(handler.clone()) {
            trace!(page, tile, "icon handler attached concurrently");
            return;
        }
        let (sink, mut frames) = FrameSink::channel(self.cfg.frame_queue);
        let writer = self.writer.clone();
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                writer.push(&frame, tile, page).await;
            }
            trace!(page, tile, "icon_frames_closed");
        });
        handler.start(key.config(), &self.device_info(page), sink);
        debug!(page, tile, kind, "icon_handler_started");
    }

    /// Write `image` to `tile` if `expected_page` is still visible.
    pub async fn push_image(
        &self,
        image: &RgbaImage,
        tile: usize,
        expected_page: usize,
    ) -> PushOutcome {
        self.writer.push(image, tile, expected_page).await
    }

    /// Run every action configured on `key`. The checks are independent; a
    /// single press may fire all of them.
    pub async fn handle_press(&self, key: &Key, page: usize) {
        let cfg = key.config();
        if let Some(command) = cfg.command() {
            self.launch(command);
        }
        if let Some(keybind) = cfg.keybind() {
            self.launch(&format!("{} {}", self.cfg.keybind_command, keybind));
        }
        if let Some(target) = cfg.switch_target()
            && let Err(e) = self.activate_page(target)
        {
            warn!(page, "Page switch failed: {}", e);
        }
        if cfg.brightness != 0
            && let Err(e) = self.device.set_brightness(cfg.brightness).await
        {
            warn!(level = cfg.brightness, "Brightness change failed: {}", Error::from(e));
        }
        if let Some(url) = cfg.url() {
            self.launch(&format!("{} {}", self.cfg.url_command, url));
        }
        if let Some(kind) = cfg.key_handler() {
            let handler = key.key_handler_or_attach(|| match self.registry.key(kind) {
                Ok(h) => Some(h),
                Err(e) => {
                    debug!(page, "{}", e);
                    None
                }
            });
            if let Some(handler) = handler {
                handler.on_press(key, &self.device_info(page));
            }
        }
    }

    /// Hand `command` to the runner, logging launch failures.
    fn launch(&self, command: &str) {
        if let Err(e) = self.runner.run(command) {
            warn!("{}", e);
        }
    }

    /// Dispatch a press of `index` on the visible page. Out-of-range indices
    /// are ignored.
    pub async fn press(&self, index: usize) {
        let page = self.session.page();
        match self.deck.key(page, index) {
            Some(key) => self.handle_press(key, page).await,
            None => trace!(page, index, "press outside page"),
        }
    }

    /// Consume device input until the link closes.
    ///
    /// Exhaustion of the event stream counts as a disconnect.
    pub async fn listen(&self) {
        let mut events = match self.device.read_events() {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Cannot read device input: {}", Error::from(e));
                self.disconnect();
                return;
            }
        };
        let mut open = self.session.subscribe_open();
        debug!("input_loop_start");
        while self.session.is_open() {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(InputEvent { index, pressed: true }) => self.press(index).await,
                    Some(_) => {}
                    None => {
                        debug!("input stream closed");
                        self.disconnect();
                        break;
                    }
                },
                changed = open.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("input_loop_exit");
    }

    /// Treat the device as gone: close the link and notify observers.
    pub fn disconnect(&self) {
        self.writer.disconnect();
    }

    /// Mark the device usable again and redraw the visible page.
    ///
    /// Like [`Engine::activate_page`], this must run inside a tokio runtime.
    pub fn reconnect(&self) -> Result<()> {
        self.session.set_open(true);
        info!("device_reconnected");
        self.activate_page(self.session.page())
    }

    /// Close the link and stop every running icon producer.
    pub fn shutdown(&self) {
        self.session.set_open(false);
        let mut stopped = 0usize;
        for handler in self.deck.keys().filter_map(|k| k.icon_handler()) {
            handler.stop();
            stopped += 1;
        }
        info!(stopped, "engine_shutdown");
    }
}

/// Create an unbounded engine event channel.
pub fn event_channel() -> (
    UnboundedSender<EngineEvent>,
    mpsc::UnboundedReceiver<EngineEvent>,
) {
    mpsc::unbounded_channel()
}
