use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor::{MoveTo, Show},
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute},
};
use tracing::{debug, warn};

use super::region::ResetScrollRegion;

/// Put the terminal back into a plain state: full-screen scrolling, visible
/// cursor, default colors, cursor parked on the last row.
pub fn write_restore(out: &mut impl Write, rows: u16) -> std::io::Result<()> {
    queue!(
        out,
        ResetScrollRegion,
        SetAttribute(Attribute::Reset),
        ResetColor,
        Show,
        MoveTo(0, rows.saturating_sub(1)),
        Print("\r\n"),
    )?;
    out.flush()
}

/// Shared, run-once terminal restoration.
///
/// Cloned into the exit guard, the panic hook and the signal handler; whichever
/// fires first does the work.
#[derive(Debug)]
pub struct Restorer {
    restored: AtomicBool,
    rows: u16,
}

impl Restorer {
    pub fn new(rows: u16) -> Arc<Self> {
        Arc::new(Self {
            restored: AtomicBool::new(false),
            rows,
        })
    }

    /// Returns `true` if this call performed the restoration.
    pub fn restore(&self, out: &mut impl Write) -> bool {
        if self.restored.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("Restoring terminal");
        if let Err(e) = write_restore(out, self.rows) {
            warn!("Failed to restore terminal: {}", e);
        }
        true
    }

    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }
}

/// Holds exclusive terminal control; restores the terminal when dropped.
pub struct TerminalGuard<W: Write> {
    restorer: Arc<Restorer>,
    out: W,
}

impl<W: Write> TerminalGuard<W> {
    pub fn new(restorer: Arc<Restorer>, out: W) -> Self {
        Self { restorer, out }
    }

    pub fn restorer(&self) -> Arc<Restorer> {
        Arc::clone(&self.restorer)
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        self.restorer.restore(&mut self.out);
    }
}
