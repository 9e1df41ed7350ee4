//! Shared session state: visible page, link status, and the device write gate.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, MutexGuard, watch};

/// Process-wide state read by every render task and the input loop.
///
/// Only page activation writes `page`. Readers take a fresh snapshot each
/// time they need it, so a page switch silences frames that are already in
/// flight for the old page.
#[derive(Debug)]
pub struct Session {
    /// Index of the visible page.
    page: AtomicUsize,
    /// Link status; receivers wake when it flips.
    open: watch::Sender<bool>,
    /// Single-holder permit serializing device writes.
    write_gate: Mutex<()>,
}

impl Session {
    /// Create a session on page 0.
    pub fn new(open: bool) -> Self {
        Self {
            page: AtomicUsize::new(0),
            open: watch::Sender::new(open),
            write_gate: Mutex::new(()),
        }
    }

    /// The currently visible page.
    pub fn page(&self) -> usize {
        self.page.load(Ordering::Acquire)
    }

    pub(crate) fn set_page(&self, page: usize) {
        self.page.store(page, Ordering::Release);
    }

    /// Whether the device link is usable.
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Set the link status, returning the previous value.
    pub fn set_open(&self, open: bool) -> bool {
        self.open.send_replace(open)
    }

    /// Watch the link status.
    pub fn subscribe_open(&self) -> watch::Receiver<bool> {
        self.open.subscribe()
    }

    /// Wait for exclusive write access. Tokio's mutex queues waiters FIFO.
    pub(crate) async fn acquire_write(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_open_flags() {
        let s = Session::new(true);
        assert_eq!(s.page(), 0);
        assert!(s.is_open());
        s.set_page(3);
        assert_eq!(s.page(), 3);
        assert!(s.set_open(false));
        assert!(!s.is_open());
    }

    #[tokio::test]
    async fn open_watch_observes_close() {
        let s = Session::new(true);
        let mut rx = s.subscribe_open();
        s.set_open(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn write_gate_is_exclusive() {
        let s = Session::new(true);
        let guard = s.acquire_write().await;
        assert!(s.write_gate.try_lock().is_err());
        drop(guard);
        assert!(s.write_gate.try_lock().is_ok());
    }
}
