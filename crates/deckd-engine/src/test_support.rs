//! Test support utilities for deckd-engine unit and integration tests.
//! These helpers are public so the `tests/` suite and tools can share them.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use config::Deck;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::{
    sync::{Semaphore, mpsc},
    time::{Instant, sleep},
};

use crate::{
    CommandRunner, Device, DeviceError, DeviceResult, Engine, EngineCfg, EngineEvent,
    HandlerRegistry, InputEvent, Result,
};

/// One recorded tile write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileWrite {
    /// Tile index.
    pub index: usize,
    /// Image written.
    pub image: RgbaImage,
}

/// In-memory device that records writes and lets tests inject input and failures.
pub struct MockDevice {
    /// Tile edge length in pixels.
    pixel_size: u32,
    /// Key columns.
    cols: u32,
    /// Key rows.
    rows: u32,
    /// Reported by `is_open`.
    open: AtomicBool,
    /// Successful writes in order.
    writes: Mutex<Vec<TileWrite>>,
    /// Successful brightness levels in order.
    brightness: Mutex<Vec<u8>>,
    /// Failures returned by upcoming writes.
    write_failures: Mutex<VecDeque<DeviceError>>,
    /// Failure returned by every brightness change.
    brightness_failure: Mutex<Option<DeviceError>>,
    /// Writes currently inside `write_tile`.
    in_flight: AtomicUsize,
    /// Peak of `in_flight`.
    max_in_flight: AtomicUsize,
    /// Simulated duration of each write.
    write_delay: Mutex<Option<Duration>>,
    /// Permits each write must take before completing.
    gate: Option<Arc<Semaphore>>,
    /// Injects input; dropped to end the stream.
    events_tx: Mutex<Option<mpsc::Sender<InputEvent>>>,
    /// Handed out by the first `read_events`.
    events_rx: Mutex<Option<mpsc::Receiver<InputEvent>>>,
    /// Count of `on_disconnect` calls.
    disconnects: AtomicUsize,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// A 5x3 device with 72 px tiles.
    pub fn new() -> Self {
        Self::build(72, None)
    }

    /// A device with `pixel_size` tiles.
    pub fn with_pixel_size(pixel_size: u32) -> Self {
        Self::build(pixel_size, None)
    }

    /// A device whose writes each wait for a permit on the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self::build(72, Some(gate.clone())), gate)
    }

    /// Shared constructor.
    fn build(pixel_size: u32, gate: Option<Arc<Semaphore>>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            pixel_size,
            cols: 5,
            rows: 3,
            open: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            brightness: Mutex::new(Vec::new()),
            write_failures: Mutex::new(VecDeque::new()),
            brightness_failure: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            write_delay: Mutex::new(None),
            gate,
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Make each write take `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Fail the next write with `err`. Calls queue up.
    pub fn fail_next_write(&self, err: DeviceError) {
        self.write_failures.lock().push_back(err);
    }

    /// Fail every brightness change with `err`.
    pub fn fail_brightness(&self, err: DeviceError) {
        *self.brightness_failure.lock() = Some(err);
    }

    /// Report the device closed before the engine is built.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Inject a press of tile `index`.
    pub async fn press(&self, index: usize) {
        self.send(InputEvent::press(index)).await;
    }

    /// Inject a release of tile `index`.
    pub async fn release(&self, index: usize) {
        self.send(InputEvent::release(index)).await;
    }

    /// Deliver `event` if the input stream is still open.
    async fn send(&self, event: InputEvent) {
        let tx = self.events_tx.lock().clone();
        if let Some(tx) = tx {
            // A closed receiver just means the engine stopped listening.
            let _closed = tx.send(event).await;
        }
    }

    /// End the input stream, as an unplugged device would.
    pub fn close_input(&self) {
        self.events_tx.lock().take();
    }

    /// All successful writes in order.
    pub fn writes(&self) -> Vec<TileWrite> {
        self.writes.lock().clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Successful writes to tile `index`.
    pub fn writes_for(&self, index: usize) -> Vec<RgbaImage> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.index == index)
            .map(|w| w.image.clone())
            .collect()
    }

    /// Writes currently inside `write_tile`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `write_tile` calls observed.
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Successful brightness changes in order.
    pub fn brightness_calls(&self) -> Vec<u8> {
        self.brightness.lock().clone()
    }

    /// Number of `on_disconnect` notifications received.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Device for MockDevice {
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
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        let delay = *self.write_delay.lock();
        match delay {
            Some(d) => sleep(d).await,
            None => tokio::task::yield_now().await,
        }
        let failure = self.write_failures.lock().pop_front();
        let result = match failure {
            Some(err) => Err(err),
            None => {
                self.writes.lock().push(TileWrite {
                    index,
                    image: image.clone(),
                });
                Ok(())
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn set_brightness(&self, level: u8) -> DeviceResult<()> {
        if let Some(err) = self.brightness_failure.lock().clone() {
            return Err(err);
        }
        self.brightness.lock().push(level);
        Ok(())
    }

    fn read_events(&self) -> DeviceResult<mpsc::Receiver<InputEvent>> {
        self.events_rx
            .lock()
            .take()
            .ok_or_else(|| DeviceError::Transport("input already claimed".into()))
    }

    fn on_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Command runner that records instead of launching.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    /// Commands in launch order.
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands launched so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> Result<()> {
        self.commands.lock().push(command.to_string());
        Ok(())
    }
}

/// An engine wired to mocks, with handles for inspecting them.
pub struct TestRig {
    /// Engine under test.
    pub engine: Engine,
    /// Device mock.
    pub device: Arc<MockDevice>,
    /// Command recorder.
    pub runner: Arc<RecordingRunner>,
    /// Engine events.
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl TestRig {
    /// Engine over `deck` with a default mock device and builtin handlers.
    pub fn new(deck: Deck) -> Self {
        Self::with_device(deck, MockDevice::new(), EngineCfg::default())
    }

    /// Engine over `deck` with the given device and tunables.
    pub fn with_device(deck: Deck, device: MockDevice, cfg: EngineCfg) -> Self {
        let registry = HandlerRegistry::with_builtins(&cfg);
        Self::with_parts(deck, device, cfg, registry)
    }

    /// Engine over `deck` with every part supplied.
    pub fn with_parts(
        deck: Deck,
        device: MockDevice,
        cfg: EngineCfg,
        registry: HandlerRegistry,
    ) -> Self {
        let device = Arc::new(device);
        let runner = Arc::new(RecordingRunner::new());
        let (tx, events) = mpsc::unbounded_channel();
        let engine =
            Engine::new_with_parts(deck, device.clone(), runner.clone(), tx, cfg, registry);
        Self {
            engine,
            device,
            runner,
            events,
        }
    }

    /// Drain all engine events received so far.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

/// Poll `pred` every 2 ms until it holds or `timeout_ms` elapses.
pub async fn wait_until<F>(timeout_ms: u64, mut pred: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(2)).await;
    }
}

/// Await `fut` for at most `timeout_ms`; `None` on timeout.
pub async fn within<F: Future>(timeout_ms: u64, fut: F) -> Option<F::Output> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
        .await
        .ok()
}
