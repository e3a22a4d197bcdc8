//! Row tasks
//!
//! Each displayed symbol gets its own task which polls the cache, decides
//! how the next frame should look, and paints its fixed line through the
//! [`TerminalGate`]. Rows never move once painting starts.
//!
//! Frame selection per wake:
//! 1. A pending afterglow repaints the previous snapshot, then clears.
//! 2. A snapshot equal to the last one painted is skipped.
//! 3. Stale snapshots are dimmed.
//! 4. A price move above the threshold flashes the row for one frame and
//!    queues the afterglow.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crossterm::style::Color;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::adapters::types::{Symbol, TickerEntry};
use crate::core::cache::TickerCache;
use crate::core::conversion::VolumeConverter;
use crate::error::AppError;

use super::format::{format_change, format_fixed, format_quote};
use super::layout::{col, volume_text, Layout, PAD, PAIR_SEPARATOR};
use super::palette::{background, Palette, Pen, CLEAR_EOL, RESET};
use super::terminal::TerminalGate;

/// Wakes during which flashes are suppressed and waits are randomized
pub const GRACE_FRAMES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Normal,
    Stale,
    Flash(Pulse),
    Afterglow(Pulse),
}

/// Flash direction when `latest` moved more than `threshold_pct` percent
/// of the previously painted price
pub fn detect_pulse(
    previous: &TickerEntry,
    latest: &TickerEntry,
    threshold_pct: Decimal,
) -> Option<Pulse> {
    let moved = (latest.last.abs() - previous.last.abs()).abs();
    let limit = (threshold_pct / Decimal::ONE_HUNDRED * previous.last).abs();
    if moved <= limit {
        return None;
    }
    if latest.last > previous.last {
        Some(Pulse::Up)
    } else {
        Some(Pulse::Down)
    }
}

// =============================================================================
// Row state
// =============================================================================

/// Per-row frame state machine
#[derive(Debug, Clone)]
pub struct RowState {
    last_painted: Option<TickerEntry>,
    afterglow: Option<Pulse>,
    last_style: Option<LineStyle>,
    grace: u32,
    threshold: Option<Decimal>,
}

impl RowState {
    /// `threshold` in percent; `None` disables flashes
    pub fn new(threshold: Option<Decimal>) -> Self {
        Self {
            last_painted: None,
            afterglow: None,
            last_style: None,
            grace: GRACE_FRAMES,
            threshold,
        }
    }

    pub fn in_grace(&self) -> bool {
        self.grace > 0
    }

    /// Sleep before the next wake. Consumes one grace wake if any remain.
    pub fn next_wait(&mut self, interval: Duration, pulse_frame: Duration, jitter: Duration) -> Duration {
        if self.grace > 0 {
            self.grace -= 1;
            return jitter;
        }
        match self.last_style {
            Some(LineStyle::Flash(_)) | Some(LineStyle::Afterglow(_)) => pulse_frame,
            _ => interval,
        }
    }

    /// Snapshot and style to paint, or `None` to skip this wake
    pub fn next_frame(&mut self, latest: Option<TickerEntry>) -> Option<(TickerEntry, LineStyle)> {
        if let Some(pulse) = self.afterglow.take() {
            if let Some(previous) = self.last_painted.clone() {
                return Some(self.painted(previous, LineStyle::Afterglow(pulse)));
            }
        }

        let latest = latest?;
        if self.last_painted.as_ref() == Some(&latest) {
            self.last_style = None;
            return None;
        }

        let style = if latest.is_stale() {
            LineStyle::Stale
        } else {
            match (&self.last_painted, self.threshold) {
                (Some(previous), Some(threshold)) if !self.in_grace() => {
                    detect_pulse(previous, &latest, threshold).map_or(LineStyle::Normal, LineStyle::Flash)
                }
                _ => LineStyle::Normal,
            }
        };

        if let LineStyle::Flash(pulse) = style {
            self.afterglow = Some(pulse);
        }
        Some(self.painted(latest, style))
    }

    fn painted(&mut self, entry: TickerEntry, style: LineStyle) -> (TickerEntry, LineStyle) {
        self.last_painted = Some(entry.clone());
        self.last_style = Some(style);
        (entry, style)
    }
}

// =============================================================================
// Line formatting
// =============================================================================

/// Colors for each segment of a line; `None` keeps the active pen
struct LineColors {
    beg: Color,
    sym: Option<Pen>,
    sep_left: Option<Pen>,
    sep_right: Option<Pen>,
    price: Option<Pen>,
    volume: Option<Pen>,
    change: Option<Pen>,
}

/// Optional pen change rendered inline
struct Ink(Option<Pen>);

impl fmt::Display for Ink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pen) => fmt::Display::fmt(&pen, f),
            None => Ok(()),
        }
    }
}

fn line_colors(palette: &Palette, offset: usize, entry: &TickerEntry, style: LineStyle) -> LineColors {
    let (bg, fg) = (&palette.bg, &palette.fg);
    let change = if entry.change < Decimal::ZERO {
        fg.red
    } else if entry.change > Decimal::ZERO {
        fg.green
    } else {
        fg.dim
    };
    let normal = LineColors {
        beg: palette.row_bg(offset),
        sym: Some(fg.dim),
        sep_left: Some(fg.normal),
        sep_right: Some(fg.dim),
        price: Some(fg.normal),
        volume: Some(fg.dim),
        change: Some(change),
    };
    match style {
        LineStyle::Normal => normal,
        LineStyle::Stale => LineColors {
            sym: Some(fg.dark),
            sep_left: None,
            sep_right: None,
            price: Some(if offset % 2 == 1 {
                fg.faint_shade
            } else {
                fg.faint_tint
            }),
            volume: None,
            change: None,
            ..normal
        },
        LineStyle::Flash(pulse) if palette.truecolor => LineColors {
            beg: pick(pulse, bg.green, bg.red),
            ..normal
        },
        LineStyle::Flash(pulse) => LineColors {
            beg: pick(pulse, bg.green, bg.red),
            sym: Some(pick(pulse, fg.green, fg.red)),
            sep_left: None,
            sep_right: None,
            price: None,
            volume: None,
            change: None,
        },
        LineStyle::Afterglow(pulse) if palette.truecolor => LineColors {
            beg: pick(pulse, bg.mix_green, bg.mix_red),
            ..normal
        },
        LineStyle::Afterglow(pulse) => LineColors {
            sym: Some(pick(pulse, fg.green, fg.red)),
            sep_left: None,
            sep_right: None,
            price: Some(pick(pulse, fg.bright_green, fg.bright_red)),
            volume: Some(pick(pulse, fg.green, fg.red)),
            change: Some(pick(pulse, fg.bright_green, fg.bright_red)),
            ..normal
        },
    }
}

fn pick<T>(pulse: Pulse, up: T, down: T) -> T {
    match pulse {
        Pulse::Up => up,
        Pulse::Down => down,
    }
}

/// Full line for one row, ending with reset and clear-to-end-of-line
#[allow(clippy::too_many_arguments)]
pub fn format_row(
    layout: &Layout,
    palette: &Palette,
    symbol: &Symbol,
    decimals: u32,
    offset: usize,
    entry: &TickerEntry,
    volume: Option<Decimal>,
    style: LineStyle,
) -> String {
    let w = &layout.widths;
    let c = line_colors(palette, offset, entry, style);

    let base = symbol.base.to_lowercase();
    let quote_width = w[col::PAIR].saturating_sub(base.len() + PAIR_SEPARATOR.len());
    let volume_cell = match layout.volume_precision {
        Some(_) => format!(
            "{:>vw$}{:PAD$}",
            volume_text(volume, entry, layout.volume_precision),
            "",
            vw = w[col::VOLUME].saturating_sub(PAD),
        ),
        None => format!(
            "{:<vw$}",
            volume_text(volume, entry, None),
            vw = w[col::VOLUME]
        ),
    };

    format!(
        "{}{:w0$}{}{base}{}{PAIR_SEPARATOR}{}{:<qw$}{}{:<w2$}{}{volume_cell}{:<w4$}{:<w5$}{}{:>w6$}{:w7$}{RESET}{CLEAR_EOL}",
        background(c.beg),
        "",
        Ink(c.sym),
        Ink(c.sep_left),
        Ink(c.sep_right),
        symbol.quote.to_lowercase(),
        Ink(c.price),
        format_fixed(entry.last, decimals),
        Ink(c.volume),
        format_quote(entry.bid, decimals),
        format_quote(entry.ask, decimals),
        Ink(c.change),
        format_change(entry.change),
        "",
        w0 = w[col::LEFT],
        qw = quote_width,
        w2 = w[col::PRICE],
        w4 = w[col::BID],
        w5 = w[col::ASK],
        w6 = w[col::CHANGE],
        w7 = w[col::RIGHT],
    )
}

// =============================================================================
// Row task
// =============================================================================

/// Everything one row task needs
pub struct RowPainter<W> {
    pub symbol: Symbol,
    /// Lines above the cursor's resting line
    pub offset: u16,
    pub decimals: u32,
    pub layout: Arc<Layout>,
    pub palette: Arc<Palette>,
    pub cache: Arc<TickerCache>,
    pub converter: Option<VolumeConverter>,
    pub gate: TerminalGate<W>,
    pub interval: Duration,
    pub pulse_frame: Duration,
    pub state: RowState,
}

impl<W: Write + Send> RowPainter<W> {
    /// Paint until cancelled. Only terminal write failures end the loop
    /// early.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), AppError> {
        tracing::debug!(symbol = %self.symbol.id, offset = self.offset, "Row task started");
        loop {
            let jitter = Duration::from_secs_f64(rand::random::<f64>());
            let wait = self.state.next_wait(self.interval, self.pulse_frame, jitter);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let latest = self.cache.get(&self.symbol.id).await;
            let Some((entry, style)) = self.state.next_frame(latest) else {
                continue;
            };

            let volume = match &self.converter {
                Some(converter) => {
                    converter
                        .convert_cached(&self.symbol, entry.volume_quote, &self.cache)
                        .await
                }
                None => None,
            };
            let line = format_row(
                &self.layout,
                &self.palette,
                &self.symbol,
                self.decimals,
                usize::from(self.offset),
                &entry,
                volume,
                style,
            );
            self.gate.paint_row(self.offset, &line).await?;
        }
        tracing::debug!(symbol = %self.symbol.id, "Row task stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::{sample_entry, sample_registry};
    use crate::tui::terminal::test_support::SharedBuffer;
    use std::str::FromStr;

    fn threshold() -> Option<Decimal> {
        Decimal::from_str("0.125").ok()
    }

    fn out_of_grace(state: &mut RowState) {
        for _ in 0..GRACE_FRAMES {
            state.next_wait(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        }
        assert!(!state.in_grace());
    }

    #[test]
    fn test_pulse_above_threshold() {
        let before = sample_entry("BTCUSD", "100");
        let after = sample_entry("BTCUSD", "100.2");
        assert_eq!(detect_pulse(&before, &after, threshold().unwrap()), Some(Pulse::Up));
        assert_eq!(detect_pulse(&after, &before, threshold().unwrap()), Some(Pulse::Down));
    }

    #[test]
    fn test_no_pulse_below_threshold() {
        let before = sample_entry("BTCUSD", "100");
        let after = sample_entry("BTCUSD", "100.05");
        assert_eq!(detect_pulse(&before, &after, threshold().unwrap()), None);
    }

    #[test]
    fn test_flash_then_afterglow_then_normal() {
        let mut state = RowState::new(threshold());
        out_of_grace(&mut state);

        let first = sample_entry("BTCUSD", "100");
        assert_eq!(state.next_frame(Some(first.clone())).unwrap().1, LineStyle::Normal);

        let jump = sample_entry("BTCUSD", "100.2");
        let (_, style) = state.next_frame(Some(jump.clone())).unwrap();
        assert_eq!(style, LineStyle::Flash(Pulse::Up));
        let wait = state.next_wait(Duration::from_secs(1), Duration::from_millis(124), Duration::ZERO);
        assert_eq!(wait, Duration::from_millis(124));

        // afterglow repaints the flashed snapshot whatever the cache holds
        let (entry, style) = state.next_frame(Some(first)).unwrap();
        assert_eq!(style, LineStyle::Afterglow(Pulse::Up));
        assert_eq!(entry, jump);

        assert!(state.next_frame(Some(jump)).is_none());
        let wait = state.next_wait(Duration::from_secs(1), Duration::from_millis(124), Duration::ZERO);
        assert_eq!(wait, Duration::from_secs(1));
    }

    #[test]
    fn test_no_flash_during_grace() {
        let mut state = RowState::new(threshold());
        state.next_frame(Some(sample_entry("BTCUSD", "100")));
        let (_, style) = state.next_frame(Some(sample_entry("BTCUSD", "150"))).unwrap();
        assert_eq!(style, LineStyle::Normal);
        assert!(state.in_grace());
    }

    #[test]
    fn test_flash_disabled_without_threshold() {
        let mut state = RowState::new(None);
        out_of_grace(&mut state);
        state.next_frame(Some(sample_entry("BTCUSD", "100")));
        let (_, style) = state.next_frame(Some(sample_entry("BTCUSD", "150"))).unwrap();
        assert_eq!(style, LineStyle::Normal);
    }

    #[test]
    fn test_identical_snapshot_skipped() {
        let mut state = RowState::new(threshold());
        let entry = sample_entry("ETHBTC", "0.05");
        assert!(state.next_frame(Some(entry.clone())).is_some());
        assert!(state.next_frame(Some(entry)).is_none());
        assert!(state.next_frame(None).is_none());
    }

    #[test]
    fn test_stale_snapshot_dimmed() {
        let mut state = RowState::new(threshold());
        out_of_grace(&mut state);
        let mut entry = sample_entry("ETHBTC", "0.05");
        state.next_frame(Some(entry.clone()));
        entry.timestamp = None;
        entry.last = Decimal::ONE;
        assert_eq!(state.next_frame(Some(entry)).unwrap().1, LineStyle::Stale);
    }

    fn layout() -> Layout {
        Layout {
            widths: [2, 9, 10, 12, 10, 10, 9, 2],
            exchange: "HitBTC".into(),
            volume_label: "Vol (USD)  ".into(),
            volume_precision: Some(0),
        }
    }

    #[test]
    fn test_format_row_cells() {
        let registry = sample_registry();
        let symbol = registry.get("ETHBTC").unwrap();
        let mut entry = sample_entry("ETHBTC", "0.054463");
        entry.open = Decimal::from_str("0.057133").unwrap();
        entry.change = crate::adapters::types::percent_change(entry.last, entry.open);

        let palette = Palette::ansi256();
        let line = format_row(
            &layout(),
            &palette,
            symbol,
            6,
            1,
            &entry,
            Some(Decimal::from(48_213_999)),
            LineStyle::Normal,
        );
        assert!(line.starts_with(&background(palette.bg.shade).to_string()));
        assert!(line.contains("eth"));
        assert!(line.contains("0.054463"));
        assert!(line.contains("48,213,999  "));
        assert!(line.contains(&format!("{}  -4.673%", palette.fg.red)));
        assert!(line.ends_with(&format!("{RESET}{CLEAR_EOL}")));
    }

    #[test]
    fn test_flash_colors_without_truecolor() {
        let registry = sample_registry();
        let symbol = registry.get("BTCUSD").unwrap();
        let entry = sample_entry("BTCUSD", "100.2");
        let palette = Palette::ansi256();
        let line = format_row(
            &layout(),
            &palette,
            symbol,
            2,
            0,
            &entry,
            None,
            LineStyle::Flash(Pulse::Up),
        );
        assert!(line.starts_with(&format!(
            "{}  {}btc",
            background(palette.bg.green),
            palette.fg.green
        )));
        assert!(!line.contains(&palette.fg.normal.to_string()));
    }

    #[test]
    fn test_empty_book_shows_placeholders() {
        let registry = sample_registry();
        let symbol = registry.get("BCHETH").unwrap();
        let mut entry = sample_entry("BCHETH", "1.25");
        entry.bid = None;
        entry.ask = None;
        let line = format_row(
            &layout(),
            &Palette::ansi256(),
            symbol,
            2,
            0,
            &entry,
            None,
            LineStyle::Normal,
        );
        assert!(line.contains("1.25"));
        assert!(line.contains("-         -         "));
    }

    #[tokio::test]
    async fn test_row_task_paints_and_stops_on_cancel() {
        let registry = sample_registry();
        let symbol = registry.get("ETHBTC").unwrap().clone();
        let cache = Arc::new(TickerCache::new());
        cache.insert(sample_entry("ETHBTC", "0.05")).await;

        let buffer = SharedBuffer::default();
        let painter = RowPainter {
            symbol,
            offset: 2,
            decimals: 6,
            layout: Arc::new(layout()),
            palette: Arc::new(Palette::ansi256()),
            cache,
            converter: None,
            gate: TerminalGate::new(buffer.clone()),
            interval: Duration::from_millis(5),
            pulse_frame: Duration::from_millis(5),
            state: RowState::new(None),
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(painter.run(cancel.clone()));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !buffer.contents().contains("0.050000") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert!(buffer.contents().starts_with("\x1b[2A\x1b[1G"));
    }
}
