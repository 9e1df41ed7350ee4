//! Load a deck configuration from disk.

use std::{fs, path::Path};

use tracing::debug;

use crate::{Deck, Error};

/// Load a `Deck` from a JSON file at `path`.
pub fn load_from_path(path: &Path) -> Result<Deck, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    let deck = Deck::from_json(&text).map_err(|e| e.with_path(path.to_path_buf()))?;
    debug!(path = %path.display(), pages = deck.pages.len(), "config_loaded");
    Ok(deck)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_file_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"pages": [[{{"text": "a"}}, {{"switch_page": 2}}], []]}}"#).unwrap();
        let deck = load_from_path(f.path()).unwrap();
        assert_eq!(deck.pages.len(), 2);
        assert_eq!(deck.pages[0][1].switch_page, 2);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Read { path: Some(_), .. }));
    }

    #[test]
    fn parse_error_carries_path() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{\"pages\": [[{{\"brightness\": \"loud\"}}]]}}").unwrap();
        let err = load_from_path(f.path()).unwrap_err();
        match err {
            Error::Parse { path, line, .. } => {
                assert_eq!(path.as_deref(), Some(f.path()));
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
