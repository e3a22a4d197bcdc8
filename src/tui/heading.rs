//! Board heading and blank board
//!
//! The heading is printed once, followed by the board: one blank shaded
//! line per row. The cursor is left on the bottom line, which is where row
//! tasks measure their offsets from.

use crate::config::HeadingStyle;

use super::layout::{col, Layout};
use super::palette::{background, Palette, CLEAR_EOL, ITALIC, ITALIC_OFF, RESET, UNDERLINE};

const RULE: &str = "─";
const CHANGE_LABEL: &str = "Δ (24h)";

/// Column labels from the price column onward
fn labels(layout: &Layout) -> String {
    let w = &layout.widths;
    let volume = if layout.volume_precision.is_some() {
        format!("{:>w$}", layout.volume_label, w = w[col::VOLUME])
    } else {
        format!("{:<w$}", layout.volume_label, w = w[col::VOLUME])
    };
    format!(
        "{:<w2$}{volume}{:<w4$}{:<w5$}{:>w6$}{:w7$}",
        "Price",
        "Bid",
        "Ask",
        CHANGE_LABEL,
        "",
        w2 = w[col::PRICE],
        w4 = w[col::BID],
        w5 = w[col::ASK],
        w6 = w[col::CHANGE],
        w7 = w[col::RIGHT],
    )
}

/// Labels spanning every column, `pair` heading the pair column
fn labels_full(layout: &Layout, pair: &str) -> String {
    let w = &layout.widths;
    format!(
        "{:w0$}{:<w1$}{}",
        "",
        pair,
        labels(layout),
        w0 = w[col::LEFT],
        w1 = w[col::PAIR],
    )
}

/// Rule with the exchange name embedded `lead` columns from the left
fn exchange_rule(layout: &Layout, lead: usize) -> String {
    let total = layout.total_width();
    let name_len = layout.exchange.chars().count();
    format!(
        "{}{}{}",
        RULE.repeat(lead),
        layout.exchange,
        RULE.repeat(total.saturating_sub(name_len + lead))
    )
}

/// Heading followed by `rows` blank board lines
pub fn render_heading(style: HeadingStyle, layout: &Layout, palette: &Palette, rows: usize) -> String {
    let w = &layout.widths;
    let total = layout.total_width();
    let fg = &palette.fg;
    let head_fg = if palette.truecolor { fg.head_alt } else { fg.dim };
    let rule_fg = if palette.truecolor { fg.faint_shade } else { fg.dark };
    let exchange_cell = format!("{:<w$}", layout.exchange, w = w[col::PAIR]);
    let hr = format!("{UNDERLINE}{}{RESET}", RULE.repeat(total));

    let mut out = background(palette.bg.dark).to_string();
    match style {
        HeadingStyle::Normal => {
            out.push_str(&format!(
                "{:w$}{}{ITALIC}{exchange_cell}{ITALIC_OFF}{head_fg}{}\n{}{hr}\n",
                "",
                fg.dark,
                labels(layout),
                fg.dark,
                w = w[col::LEFT],
            ));
        }
        HeadingStyle::HrOver | HeadingStyle::HrUnder => {
            let ex_hr = format!(
                "{ITALIC}{rule_fg}{}{ITALIC_OFF}\n",
                exchange_rule(layout, w[col::LEFT])
            );
            let heading = format!("{head_fg}{}\n", labels_full(layout, ""));
            if style == HeadingStyle::HrOver {
                out.push_str(&ex_hr);
                out.push_str(&heading);
            } else {
                out.push_str(&heading);
                out.push_str(&ex_hr);
            }
        }
        HeadingStyle::Full => {
            let lead = total.saturating_sub(layout.exchange.chars().count() + w[col::RIGHT]);
            out.push_str(&format!(
                "{ITALIC}{rule_fg}{}{ITALIC_OFF}\n{head_fg}{}\n{rule_fg}{hr}\n",
                exchange_rule(layout, lead),
                labels_full(layout, "Pair"),
            ));
        }
        HeadingStyle::Slim => {
            let italic_off = if palette.truecolor {
                ITALIC_OFF.to_string()
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{:w$}{}{ITALIC}{exchange_cell}{italic_off}{head_fg}{}\n",
                "",
                fg.dark,
                labels(layout),
                w = w[col::LEFT],
            ));
        }
    }

    out.push_str(&render_board(layout, palette, rows));
    out
}

/// Blank shaded lines, cursor left at the end of the last one
pub fn render_board(layout: &Layout, palette: &Palette, rows: usize) -> String {
    let bg = if palette.truecolor {
        palette.bg.dark
    } else {
        palette.bg.tint
    };
    let blank = " ".repeat(layout.total_width());
    let lines = vec![blank; rows.max(1)].join("\n");
    format!("{}{lines}{RESET}{CLEAR_EOL}", background(bg))
}
