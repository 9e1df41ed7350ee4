//! Serialized, page-checked writes to the device.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::{Device, Notifier, Session};

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame reached the device.
    Written,
    /// The page changed or the device closed while the frame waited.
    Discarded,
    /// The device rejected the write.
    Failed,
}

/// Pushes tile images to the device, one writer at a time.
#[derive(Clone)]
pub struct TileWriter {
    /// Device connection.
    device: Arc<dyn Device>,
    /// Page, link status and write gate.
    session: Arc<Session>,
    /// Disconnect announcements.
    notifier: Notifier,
}

impl TileWriter {
    /// Create a writer over a device and session.
    pub fn new(device: Arc<dyn Device>, session: Arc<Session>, notifier: Notifier) -> Self {
        Self {
            device,
            session,
            notifier,
        }
    }

    /// Write `image` to `tile` if `expected_page` is still visible once the
    /// write gate is ours. Stale frames are dropped silently.
    pub async fn push(&self, image: &RgbaImage, tile: usize, expected_page: usize) -> PushOutcome {
        let _gate = self.session.acquire_write().await;
        // Checked under the gate: a frame that went stale while waiting is dropped.
        let page = self.session.page();
        if page != expected_page || !self.session.is_open() {
            trace!(tile, expected_page, page, "frame_discarded");
            return PushOutcome::Discarded;
        }
        match self.device.write_tile(tile, image).await {
            Ok(()) => {
                trace!(tile, page, "frame_written");
                PushOutcome::Written
            }
            Err(e) if e.is_transport() => {
                warn!(tile, error = %e, "device write failed; disconnecting");
                self.disconnect();
                PushOutcome::Failed
            }
            Err(e) => {
                warn!(tile, error = %e, "device write failed");
                PushOutcome::Failed
            }
        }
    }

    /// Mark the link closed and tell the device and observers. Repeated
    /// calls after the first are no-ops.
    pub fn disconnect(&self) {
        if self.session.set_open(false) {
            debug!("device_disconnected");
            self.device.on_disconnect();
            self.notifier.disconnected();
        }
    }
}
