//! Deck, page and key configuration types.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Static configuration for one physical key.
///
/// Every field is optional; an all-default key renders as a black tile and
/// does nothing on press.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Path to an icon image file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Text drawn centered over the icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Shell command launched on press.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Keystroke sequence injected on press (e.g. `ctrl+c`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keybind: Option<String>,
    /// URL opened on press.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 1-based page to switch to on press; 0 means none.
    pub switch_page: usize,
    /// Device brightness to set on press; 0 means unset.
    pub brightness: u8,
    /// Icon producer kind (e.g. `Gif`, `Counter`, `Time`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_handler: Option<String>,
    /// Key action kind (e.g. `Counter`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_handler: Option<String>,
}

impl KeyConfig {
    /// Icon path, treating an empty string as unset.
    pub fn icon(&self) -> Option<&str> {
        non_empty(&self.icon)
    }

    /// Overlay text, treating an empty string as unset.
    pub fn text(&self) -> Option<&str> {
        non_empty(&self.text)
    }

    /// Command, treating an empty string as unset.
    pub fn command(&self) -> Option<&str> {
        non_empty(&self.command)
    }

    /// Keybind, treating an empty string as unset.
    pub fn keybind(&self) -> Option<&str> {
        non_empty(&self.keybind)
    }

    /// URL, treating an empty string as unset.
    pub fn url(&self) -> Option<&str> {
        non_empty(&self.url)
    }

    /// 0-based switch target, if any.
    pub fn switch_target(&self) -> Option<usize> {
        self.switch_page.checked_sub(1)
    }

    /// Icon handler kind, treating an empty string as unset.
    pub fn icon_handler(&self) -> Option<&str> {
        non_empty(&self.icon_handler)
    }

    /// Key handler kind, treating an empty string as unset.
    pub fn key_handler(&self) -> Option<&str> {
        non_empty(&self.key_handler)
    }
}

/// Borrow the string in `s` unless it is absent or empty.
fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.is_empty())
}

/// One screen of keys, indexed by tile position.
pub type Page = Vec<KeyConfig>;

/// An ordered list of pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Pages in display order.
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Deck {
    /// Parse a deck from JSON text.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize the deck to pretty JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
