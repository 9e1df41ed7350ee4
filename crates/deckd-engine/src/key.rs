//! Runtime key state layered over the static configuration.

use std::{fmt, sync::Arc};

use config::{Deck, KeyConfig};
use image::RgbaImage;
use once_cell::sync::OnceCell;

use crate::handlers::{IconHandler, KeyHandler};

/// A configured key plus its lazily populated render and handler state.
///
/// Each cell is written at most once for the life of the key.
pub struct Key {
    /// Static configuration.
    config: KeyConfig,
    /// Rendered static image.
    image: OnceCell<Arc<RgbaImage>>,
    /// Icon producer attached on first render.
    icon_handler: OnceCell<Arc<dyn IconHandler>>,
    /// Key action attached on first press.
    key_handler: OnceCell<Arc<dyn KeyHandler>>,
}

impl Key {
    /// Wrap a key configuration with empty runtime state.
    pub fn new(config: KeyConfig) -> Self {
        Self {
            config,
            image: OnceCell::new(),
            icon_handler: OnceCell::new(),
            key_handler: OnceCell::new(),
        }
    }

    /// Static configuration.
    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// The rendered static image, if one has been computed.
    pub fn cached_image(&self) -> Option<Arc<RgbaImage>> {
        self.image.get().cloned()
    }

    /// Write-once cell holding the rendered image.
    pub(crate) fn image_cell(&self) -> &OnceCell<Arc<RgbaImage>> {
        &self.image
    }

    /// The attached icon producer, if any.
    pub fn icon_handler(&self) -> Option<&Arc<dyn IconHandler>> {
        self.icon_handler.get()
    }

    /// Attach an icon producer. Returns false if one was already attached,
    /// in which case `handler` is dropped unused.
    pub(crate) fn attach_icon_handler(&self, handler: Arc<dyn IconHandler>) -> bool {
        self.icon_handler.set(handler).is_ok()
    }

    /// The attached key action, if any.
    pub fn key_handler(&self) -> Option<&Arc<dyn KeyHandler>> {
        self.key_handler.get()
    }

    /// Return the attached key action, attaching `make()` first if none is.
    pub(crate) fn key_handler_or_attach<F>(&self, make: F) -> Option<&Arc<dyn KeyHandler>>
    where
        F: FnOnce() -> Option<Arc<dyn KeyHandler>>,
    {
        if self.key_handler.get().is_none()
            && let Some(handler) = make()
        {
            // A concurrent attach wins; either way the cell is now set.
            let _ignored = self.key_handler.set(handler);
        }
        self.key_handler.get()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("config", &self.config)
            .field("cached_image", &self.image.get().is_some())
            .field("icon_handler", &self.icon_handler.get().is_some())
            .field("key_handler", &self.key_handler.get().is_some())
            .finish()
    }
}

/// All pages of runtime keys, positionally indexed like the configuration.
#[derive(Debug, Default)]
pub struct DeckState {
    /// Keys per page, in tile order.
    pages: Vec<Vec<Arc<Key>>>,
}

impl DeckState {
    /// Build runtime state for every key in `deck`.
    pub fn new(deck: Deck) -> Self {
        let pages = deck
            .pages
            .into_iter()
            .map(|page| page.into_iter().map(|k| Arc::new(Key::new(k))).collect())
            .collect();
        Self { pages }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Keys on `page`, if it exists.
    pub fn page(&self, page: usize) -> Option<&[Arc<Key>]> {
        self.pages.get(page).map(Vec::as_slice)
    }

    /// The key at `index` on `page`, if both are in range.
    pub fn key(&self, page: usize, index: usize) -> Option<&Arc<Key>> {
        self.pages.get(page)?.get(index)
    }

    /// Iterate every key on every page.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<Key>> {
        self.pages.iter().flatten()
    }
}
