//! Collaborator interfaces consumed by the engine.
//!
//! The engine never talks to hardware or spawns processes directly; it goes
//! through [`Device`] and [`CommandRunner`] so tests and tools can substitute
//! their own implementations.

use std::process::{Command, Stdio};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{DeviceResult, Error, Result};

/// A single press or release reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Tile index of the key.
    pub index: usize,
    /// True on press, false on release.
    pub pressed: bool,
}

impl InputEvent {
    /// A press of tile `index`.
    pub fn press(index: usize) -> Self {
        Self {
            index,
            pressed: true,
        }
    }

    /// A release of tile `index`.
    pub fn release(index: usize) -> Self {
        Self {
            index,
            pressed: false,
        }
    }
}

/// Static facts about the connected device handed to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Edge length of a tile in pixels.
    pub pixel_size: u32,
    /// Number of key columns.
    pub cols: u32,
    /// Number of key rows.
    pub rows: u32,
    /// Page the handler's key lives on.
    pub page: usize,
}

/// Connection to a physical deck.
#[async_trait]
pub trait Device: Send + Sync {
    /// Fixed tile resolution (tiles are square).
    fn pixel_size(&self) -> u32;

    /// Number of key columns.
    fn cols(&self) -> u32;

    /// Number of key rows.
    fn rows(&self) -> u32;

    /// Whether the connection is usable right now.
    fn is_open(&self) -> bool;

    /// Write an image to tile `index`. The image is `pixel_size` square.
    async fn write_tile(&self, index: usize, image: &RgbaImage) -> DeviceResult<()>;

    /// Set panel brightness.
    async fn set_brightness(&self, level: u8) -> DeviceResult<()>;

    /// Start reading input. The channel closes when the device goes away.
    fn read_events(&self) -> DeviceResult<mpsc::Receiver<InputEvent>>;

    /// Called once the engine has decided the link is gone.
    fn on_disconnect(&self) {}
}

/// Launches external commands without waiting for them.
pub trait CommandRunner: Send + Sync {
    /// Start `command`; returns once the process has been spawned.
    fn run(&self, command: &str) -> Result<()>;
}

/// Runs commands through `/bin/sh -c`, detached from our stdio.
///
/// Must be used from within a tokio runtime; the child is reaped on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Interpreter invoked with `-c`.
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("/bin/sh")
    }
}

impl ShellRunner {
    /// Create a runner that uses `shell` to interpret commands.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<()> {
        info!("Launching command: {}", command);
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Command {
                command: command.to_string(),
                source,
            })?;
        let command = command.to_string();
        // Reap the child so it does not linger as a zombie.
        tokio::task::spawn_blocking(move || match child.wait() {
            Ok(status) => debug!(%command, ?status, "command_exited"),
            Err(e) => debug!(%command, error = %e, "command_wait_failed"),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_runner_reports_missing_shell() {
        let runner = ShellRunner::new("/nonexistent/shell");
        let err = runner.run("true").unwrap_err();
        assert!(matches!(err, Error::Command { ref command, .. } if command == "true"));
    }

    #[tokio::test]
    async fn shell_runner_launches() {
        assert!(ShellRunner::default().run("true").is_ok());
    }
}
