//! Number formatting for board cells

use rust_decimal::{Decimal, RoundingStrategy};

/// Insert `,` every three digits of the integer part
pub fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };

    let digits = int_part.len();
    let mut grouped = String::with_capacity(text.len() + digits / 3);
    grouped.push_str(sign);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.push_str(frac_part);
    grouped
}

/// Fixed-point text with exactly `decimals` places, half away from zero
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", decimals as usize, rounded)
}

pub fn format_grouped(value: Decimal, decimals: u32) -> String {
    group_thousands(&format_fixed(value, decimals))
}

/// Fractional change as a signed percentage, e.g. `0.01234` -> `+1.234%`
pub fn format_change(fraction: Decimal) -> String {
    let percent = fraction * Decimal::ONE_HUNDRED;
    let text = format_fixed(percent, 3);
    match text.strip_prefix('-') {
        Some(magnitude) if magnitude.chars().all(|c| c == '0' || c == '.') => {
            format!("+{magnitude}%")
        }
        Some(_) => format!("{text}%"),
        None => format!("+{text}%"),
    }
}

/// Bid or ask cell; `-` when that side of the book is empty
pub fn format_quote(value: Option<Decimal>, decimals: u32) -> String {
    value.map_or_else(|| "-".to_string(), |v| format_fixed(v, decimals))
}

/// Value as received, trailing zeros removed
pub fn format_plain(value: Decimal) -> String {
    value.normalize().to_string()
}
