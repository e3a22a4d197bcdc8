//! Color palettes for the ticker board
//!
//! Two tables: xterm 256-color indices for any ANSI terminal, and 24-bit
//! RGB for terminals advertising truecolor. Both expose the same slots so
//! the renderer never branches on color depth except for pulse styling.
//!
//! Lines are assembled with `format!`, so colors and attributes are embedded
//! through [`Ansi`], which renders a crossterm command in place.

use std::fmt;

use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;

/// A crossterm command rendered inline as its escape sequence
#[derive(Debug, Clone, Copy)]
pub struct Ansi<C>(pub C);

impl<C: Command> fmt::Display for Ansi<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_ansi(f)
    }
}

pub const RESET: Ansi<SetAttribute> = Ansi(SetAttribute(Attribute::Reset));
pub const CLEAR_EOL: Ansi<Clear> = Ansi(Clear(ClearType::UntilNewLine));
pub const ITALIC: Ansi<SetAttribute> = Ansi(SetAttribute(Attribute::Italic));
pub const ITALIC_OFF: Ansi<SetAttribute> = Ansi(SetAttribute(Attribute::NoItalic));
pub const UNDERLINE: Ansi<SetAttribute> = Ansi(SetAttribute(Attribute::Underlined));

pub fn background(color: Color) -> Ansi<SetBackgroundColor> {
    Ansi(SetBackgroundColor(color))
}

/// Foreground color, optionally bold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub color: Color,
    pub bold: bool,
}

impl Pen {
    pub const fn plain(color: Color) -> Self {
        Self { color, bold: false }
    }

    pub const fn bold(color: Color) -> Self {
        Self { color, bold: true }
    }
}

impl fmt::Display for Pen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SetForegroundColor(self.color).write_ansi(f)?;
        if self.bold {
            SetAttribute(Attribute::Bold).write_ansi(f)?;
        }
        Ok(())
    }
}

/// Background slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backgrounds {
    /// Odd rows
    pub shade: Color,
    /// Even rows
    pub tint: Color,
    pub dark: Color,
    pub red: Color,
    pub mix_red: Color,
    pub green: Color,
    pub mix_green: Color,
}

/// Foreground slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Foregrounds {
    pub normal: Pen,
    pub dim: Pen,
    pub dark: Pen,
    pub faint_shade: Pen,
    pub faint_tint: Pen,
    pub red: Pen,
    pub bright_red: Pen,
    pub green: Pen,
    pub bright_green: Pen,
    pub head_alt: Pen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub bg: Backgrounds,
    pub fg: Foregrounds,
    pub truecolor: bool,
}

// =============================================================================
// Tables
// =============================================================================

const fn ansi(value: u8) -> Color {
    Color::AnsiValue(value)
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

const BG_256: Backgrounds = Backgrounds {
    shade: ansi(236),
    tint: ansi(237),
    dark: ansi(238),
    red: ansi(235),
    mix_red: ansi(235),
    green: ansi(235),
    mix_green: ansi(235),
};

const FG_256: Foregrounds = Foregrounds {
    normal: Pen::plain(ansi(253)),
    dim: Pen::plain(ansi(250)),
    dark: Pen::plain(ansi(243)),
    faint_shade: Pen::plain(ansi(237)),
    faint_tint: Pen::plain(ansi(236)),
    red: Pen::plain(ansi(95)),
    bright_red: Pen::bold(ansi(167)),
    green: Pen::plain(ansi(65)),
    bright_green: Pen::bold(ansi(83)),
    head_alt: Pen::plain(ansi(228)),
};

const BG_RGB: Backgrounds = Backgrounds {
    shade: rgb(0x14, 0x37, 0x4a),
    tint: rgb(0x16, 0x3e, 0x53),
    dark: rgb(0x15, 0x30, 0x43),
    red: rgb(0x3e, 0x3d, 0x48),
    mix_red: rgb(0x29, 0x3a, 0x49),
    green: rgb(0x10, 0x55, 0x54),
    mix_green: rgb(0x12, 0x46, 0x4f),
};

const FG_RGB: Foregrounds = Foregrounds {
    normal: Pen::plain(rgb(0xd3, 0xd7, 0xcf)),
    dim: Pen::plain(rgb(0xa1, 0xb5, 0xc1)),
    dark: Pen::plain(rgb(0x32, 0x5a, 0x6a)),
    faint_shade: Pen::plain(rgb(0x22, 0x4a, 0x5a)),
    faint_tint: Pen::plain(rgb(0x15, 0x30, 0x43)),
    red: Pen::plain(rgb(0xbf, 0x42, 0x32)),
    bright_red: Pen::plain(rgb(0xe5, 0x55, 0x41)),
    green: Pen::plain(rgb(0x01, 0xa8, 0x68)),
    bright_green: Pen::plain(rgb(0x0a, 0xcd, 0x8a)),
    head_alt: Pen::plain(rgb(0x50, 0x76, 0x91)),
};

impl Palette {
    pub fn new(truecolor: bool) -> Self {
        if truecolor {
            Self::truecolor()
        } else {
            Self::ansi256()
        }
    }

    pub fn ansi256() -> Self {
        Self {
            bg: BG_256,
            fg: FG_256,
            truecolor: false,
        }
    }

    pub fn truecolor() -> Self {
        Self {
            bg: BG_RGB,
            fg: FG_RGB,
            truecolor: true,
        }
    }

    /// Row background; `offset` counts rows up from the bottom of the board
    pub fn row_bg(&self, offset: usize) -> Color {
        if offset % 2 == 1 {
            self.bg.shade
        } else {
            self.bg.tint
        }
    }
}
