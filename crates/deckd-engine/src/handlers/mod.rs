//! Pluggable icon producers and key actions.
//!
//! Handlers are looked up by kind name in a [`HandlerRegistry`]. The engine
//! only sees the [`IconHandler`] and [`KeyHandler`] traits; adding a kind means
//! registering a constructor, nothing else.

use std::{any::Any, collections::HashMap, sync::Arc};

use config::KeyConfig;
use image::RgbaImage;
use tokio::sync::mpsc;

use crate::{DeviceInfo, EngineCfg, Error, Key, Result};

mod clock;
mod counter;
mod gif;

pub use clock::ClockIcon;
pub use counter::{CounterIcon, CounterKey};
pub use gif::GifIcon;

/// Receives frames from an icon producer and forwards them to the device.
///
/// `emit` waits while the queue is full, so a producer cannot outrun the
/// device writer.
#[derive(Debug, Clone)]
pub struct FrameSink {
    /// Bounded queue to the forwarding task.
    tx: mpsc::Sender<Arc<RgbaImage>>,
}

impl FrameSink {
    /// Create a sink with room for `depth` queued frames.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<Arc<RgbaImage>>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Queue a frame. Returns false once the receiving side is gone.
    pub async fn emit(&self, frame: Arc<RgbaImage>) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

/// A long-lived producer of replacement images for one key.
pub trait IconHandler: Send + Sync + 'static {
    /// Begin producing frames into `sink`. Returns immediately; production
    /// runs on its own task until [`stop`](Self::stop) is called.
    fn start(&self, key: &KeyConfig, info: &DeviceInfo, sink: FrameSink);

    /// Ask the producer to stop. Takes effect before its next emission.
    fn stop(&self);

    /// False once [`stop`](Self::stop) has been called.
    fn is_running(&self) -> bool;

    /// Access to the concrete type, for key actions that drive a producer.
    fn as_any(&self) -> &dyn Any;
}

/// A synchronous reaction to a key press.
pub trait KeyHandler: Send + Sync + 'static {
    /// Handle a press of `key`.
    fn on_press(&self, key: &Key, info: &DeviceInfo);
}

/// Builds a fresh icon producer.
type IconCtor = Arc<dyn Fn() -> Arc<dyn IconHandler> + Send + Sync>;
/// Builds a fresh key action.
type KeyCtor = Arc<dyn Fn() -> Arc<dyn KeyHandler> + Send + Sync>;

/// Maps kind names to handler constructors.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    /// Icon producer constructors by kind.
    icons: HashMap<String, IconCtor>,
    /// Key action constructors by kind.
    keys: HashMap<String, KeyCtor>,
}

impl HandlerRegistry {
    /// A registry with no kinds.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in kinds: icon producers `Gif`, `Counter`
    /// and `Time`, key action `Counter`.
    pub fn with_builtins(cfg: &EngineCfg) -> Self {
        let mut reg = Self::empty();
        let color = cfg.text_color;
        let counter_every = cfg.counter_interval;
        let clock_every = cfg.clock_interval;
        reg.register_icon("Gif", || Arc::new(GifIcon::new()));
        reg.register_icon("Counter", move || {
            Arc::new(CounterIcon::new(counter_every, color))
        });
        reg.register_icon("Time", move || Arc::new(ClockIcon::new(clock_every, color)));
        reg.register_key("Counter", || Arc::new(CounterKey));
        reg
    }

    /// Register (or replace) an icon producer kind.
    pub fn register_icon<F>(&mut self, kind: impl Into<String>, ctor: F)
    where
        F: Fn() -> Arc<dyn IconHandler> + Send + Sync + 'static,
    {
        self.icons.insert(kind.into(), Arc::new(ctor));
    }

    /// Register (or replace) a key action kind.
    pub fn register_key<F>(&mut self, kind: impl Into<String>, ctor: F)
    where
        F: Fn() -> Arc<dyn KeyHandler> + Send + Sync + 'static,
    {
        self.keys.insert(kind.into(), Arc::new(ctor));
    }

    /// Construct a fresh icon producer of `kind`.
    pub fn icon(&self, kind: &str) -> Result<Arc<dyn IconHandler>> {
        self.icons
            .get(kind)
            .map(|ctor| ctor())
            .ok_or_else(|| Error::UnknownHandler {
                capability: "icon",
                kind: kind.to_string(),
            })
    }

    /// Construct a fresh key action of `kind`.
    pub fn key(&self, kind: &str) -> Result<Arc<dyn KeyHandler>> {
        self.keys
            .get(kind)
            .map(|ctor| ctor())
            .ok_or_else(|| Error::UnknownHandler {
                capability: "key",
                kind: kind.to_string(),
            })
    }

    /// Registered icon producer kinds, sorted.
    pub fn icon_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.icons.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Registered key action kinds, sorted.
    pub fn key_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
