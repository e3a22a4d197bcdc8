//! Terminal write gate
//!
//! Every write to the terminal goes through one mutex so escape sequences
//! from different rows never interleave. The lock is taken, the bytes are
//! written and flushed synchronously, and the lock is dropped before the
//! caller awaits anything else.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::cursor::{MoveDown, MoveToColumn, MoveUp};
use crossterm::style::Print;
use crossterm::queue;
use tokio::sync::Mutex;

/// Shared, serialized handle on the terminal output
pub struct TerminalGate<W> {
    out: Arc<Mutex<W>>,
}

impl<W> Clone for TerminalGate<W> {
    fn clone(&self) -> Self {
        Self {
            out: Arc::clone(&self.out),
        }
    }
}

impl<W: Write + Send> TerminalGate<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    /// Write `text` at the current cursor position
    pub async fn write_raw(&self, text: &str) -> io::Result<()> {
        let mut guard = self.out.lock().await;
        let out: &mut W = &mut guard;
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    /// Replace the line `offset` rows above the cursor, then return the
    /// cursor to its resting line
    pub async fn paint_row(&self, offset: u16, line: &str) -> io::Result<()> {
        let mut guard = self.out.lock().await;
        let out: &mut W = &mut guard;
        // MoveUp(0) would still move one line on most terminals
        if offset > 0 {
            queue!(out, MoveUp(offset))?;
        }
        queue!(out, MoveToColumn(0), Print(line))?;
        if offset > 0 {
            queue!(out, MoveDown(offset))?;
        }
        out.flush()
    }
}
