//! Tile rendering: icon loading, resizing, and text overlay.

use std::{convert::Infallible, path::Path, sync::Arc};

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle, ascii::FONT_8X13},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use image::{ImageError, ImageReader, Rgba, RgbaImage, imageops::FilterType};
use tracing::trace;

use crate::{Error, Key, Result};

/// Fixed-width bitmap font used for key text.
pub const TEXT_FONT: &MonoFont<'static> = &FONT_8X13;

/// Opaque black.
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Map an `image` failure on `path` to the engine taxonomy.
fn icon_error(path: &Path, e: ImageError) -> Error {
    match e {
        ImageError::IoError(source) => Error::Io {
            path: path.to_path_buf(),
            source,
        },
        source => Error::Decode {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Resize `img` to a `pixel_size` square with a Lanczos filter.
pub fn resize_tile(img: &RgbaImage, pixel_size: u32) -> RgbaImage {
    image::imageops::resize(img, pixel_size, pixel_size, FilterType::Lanczos3)
}

/// Open and decode the image at `path`, sniffing its format from content,
/// and resize it to a tile.
pub fn load_icon(path: &Path, pixel_size: u32) -> Result<RgbaImage> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let img = reader.decode().map_err(|e| icon_error(path, e))?;
    Ok(resize_tile(&img.to_rgba8(), pixel_size))
}

/// A solid black tile.
pub fn blank_tile(pixel_size: u32) -> RgbaImage {
    RgbaImage::from_pixel(pixel_size, pixel_size, BLACK)
}

/// A black tile with `text` centered on it.
pub fn text_tile(text: &str, pixel_size: u32, color: Rgb888) -> RgbaImage {
    let mut img = blank_tile(pixel_size);
    draw_text(&mut img, text, color);
    img
}

/// Draw `text` centered on `img`, one line per `\n`. Pixels outside the
/// image are clipped.
pub fn draw_text(img: &mut RgbaImage, text: &str, color: Rgb888) {
    let style = MonoTextStyle::new(TEXT_FONT, color);
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let line_height = TEXT_FONT.character_size.height as i32;
    let lines: Vec<&str> = text.lines().collect();
    let cx = img.width() as i32 / 2;
    let first_y = img.height() as i32 / 2 - (lines.len() as i32 - 1) * line_height / 2;

    let mut canvas = TileCanvas { img };
    for (i, line) in lines.iter().enumerate() {
        let at = Point::new(cx, first_y + i as i32 * line_height);
        if let Err(never) = Text::with_text_style(line, at, style, layout).draw(&mut canvas) {
            match never {}
        }
    }
}

/// Materialize the static image for `key`, computing it at most once.
///
/// Keys without an icon get a black tile. Text, when set, is drawn over the
/// result. Later calls return the cached image unchanged.
pub fn render_key_image(key: &Key, pixel_size: u32, text_color: Rgb888) -> Result<Arc<RgbaImage>> {
    key.image_cell()
        .get_or_try_init(|| -> Result<Arc<RgbaImage>> {
            let cfg = key.config();
            let mut img = match cfg.icon() {
                None => blank_tile(pixel_size),
                Some(path) => load_icon(Path::new(path), pixel_size)?,
            };
            if let Some(text) = cfg.text() {
                draw_text(&mut img, text, text_color);
            }
            trace!(icon = ?cfg.icon(), text = ?cfg.text(), "key_rendered");
            Ok(Arc::new(img))
        })
        .cloned()
}

/// Draw target over an RGBA tile.
struct TileCanvas<'a> {
    /// Tile being drawn on.
    img: &'a mut RgbaImage,
}

impl OriginDimensions for TileCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.img.width(), self.img.height())
    }
}

impl DrawTarget for TileCanvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.img.dimensions();
        for Pixel(p, color) in pixels {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < w && (p.y as u32) < h {
                self.img.put_pixel(
                    p.x as u32,
                    p.y as u32,
                    Rgba([color.r(), color.g(), color.b(), 255]),
                );
            }
        }
        Ok(())
    }
}
