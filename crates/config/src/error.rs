//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone)]
/// Errors produced while loading or parsing a deck configuration.
pub enum Error {
    #[error("{message}")]
    /// I/O or filesystem read error.
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    #[error("{message}")]
    /// JSON parse error.
    Parse {
        /// Optional path associated with the parse error.
        path: Option<PathBuf>,
        /// 1-based line number reported by the parser.
        line: usize,
        /// 1-based column number reported by the parser.
        col: usize,
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Render a human-friendly error message including location when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Read { path, message } => match path {
                Some(p) => format!("Read error at {}: {}", p.display(), message),
                None => format!("Read error: {}", message),
            },
            Self::Parse {
                path,
                line,
                col,
                message,
            } => match path {
                Some(p) => format!("Parse error at {}:{}:{}: {}", p.display(), line, col, message),
                None => format!("Parse error at line {}, column {}: {}", line, col, message),
            },
        }
    }

    /// Attach a path to an error that was produced without one.
    pub(crate) fn with_path(self, p: PathBuf) -> Self {
        match self {
            Self::Read { message, .. } => Self::Read {
                path: Some(p),
                message,
            },
            Self::Parse {
                line, col, message, ..
            } => Self::Parse {
                path: Some(p),
                line,
                col,
                message,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse {
            path: None,
            line: e.line(),
            col: e.column(),
            message: e.to_string(),
        }
    }
}
