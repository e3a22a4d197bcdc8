//! Terminal board rendering
//!
//! Plain ANSI output, no alternate screen: the heading and a blank board are
//! printed once, then each row task repaints its own line in place.

pub mod format;
pub mod heading;
pub mod layout;
pub mod palette;
pub mod row;
pub mod terminal;

pub use heading::render_heading;
pub use layout::{Layout, RowSeed};
pub use palette::{Palette, Pen};
pub use row::{detect_pulse, LineStyle, Pulse, RowPainter, RowState};
pub use terminal::TerminalGate;
