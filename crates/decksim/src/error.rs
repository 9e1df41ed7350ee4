//! Error handling for the decksim crate.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for decksim operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can end a simulation run.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration resolution or parsing errors.
    #[error("{}", .0.pretty())]
    Config(#[from] config::Error),
    /// Errors surfaced by the engine.
    #[error("Engine error: {0}")]
    Engine(#[from] deckd_engine::Error),
    /// The requested start page does not exist.
    #[error("Start page {page} is outside 1..={count}")]
    StartPage {
        /// Requested page, counted from 1.
        page: usize,
        /// Pages in the configuration.
        count: usize,
    },
}
