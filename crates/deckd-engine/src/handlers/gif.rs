//! Animated GIF icon producer.

use std::{
    any::Any,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use config::KeyConfig;
use image::{AnimationDecoder, RgbaImage, codecs::gif::GifDecoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{FrameSink, IconHandler};
use crate::{DeviceInfo, Error, Result, render};

/// Floor for per-frame delays; many GIFs declare 0.
pub const MIN_FRAME_DELAY_MS: u64 = 20;

/// One decoded, tile-sized animation frame.
#[derive(Debug, Clone)]
pub struct GifFrame {
    /// Composited frame image.
    pub image: Arc<RgbaImage>,
    /// How long to show it.
    pub delay: Duration,
}

/// Decode every frame of the GIF at `path` and resize each to a tile.
pub fn load_gif_frames(path: &Path, pixel_size: u32) -> Result<Vec<GifFrame>> {
    let decode_err = |source| Error::Decode {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = GifDecoder::new(BufReader::new(file)).map_err(decode_err)?;
    let frames = decoder.into_frames().collect_frames().map_err(decode_err)?;
    Ok(frames
        .into_iter()
        .map(|f| {
            let (num, den) = f.delay().numer_denom_ms();
            let ms = u64::from(num) / u64::from(den.max(1));
            GifFrame {
                image: Arc::new(render::resize_tile(f.buffer(), pixel_size)),
                delay: Duration::from_millis(ms.max(MIN_FRAME_DELAY_MS)),
            }
        })
        .collect())
}

/// Plays the key's icon as an animated GIF, looping forever.
#[derive(Debug, Default)]
pub struct GifIcon {
    /// Stops playback.
    token: CancellationToken,
}

impl GifIcon {
    /// A player that has not started yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IconHandler for GifIcon {
    fn start(&self, key: &KeyConfig, info: &DeviceInfo, sink: FrameSink) {
        let Some(path) = key.icon() else {
            warn!("Gif icon handler on a key without an icon; nothing to play");
            return;
        };
        let path = PathBuf::from(path);
        let px = info.pixel_size;
        let token = self.token.clone();
        tokio::spawn(async move {
            let load_path = path.clone();
            let frames =
                match tokio::task::spawn_blocking(move || load_gif_frames(&load_path, px)).await {
                    Ok(Ok(frames)) if !frames.is_empty() => frames,
                    Ok(Ok(_)) => {
                        warn!(path = %path.display(), "gif has no frames");
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!("{}", e);
                        return;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "gif decode task failed");
                        return;
                    }
                };
            debug!(path = %path.display(), frames = frames.len(), "gif_loaded");
            for frame in frames.iter().cycle() {
                if token.is_cancelled() || !sink.emit(frame.image.clone()).await {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(frame.delay) => {}
                }
            }
            trace!(path = %path.display(), "gif_stopped");
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
