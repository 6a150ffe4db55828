use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns (CJK and emoji count as 2).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Collapse a store-provided string onto one clean line.
///
/// Control characters (including ANSI escape introducers) are dropped and
/// runs of whitespace, newlines included, become a single space. Store rows
/// come from scraped feeds, so titles can carry anything.
///
/// Returns `Cow::Borrowed` when the input is already clean.
pub fn single_line(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    let clean = !trimmed.chars().any(|c| c.is_control())
        && !trimmed.contains("  ")
        && trimmed.len() == s.len();
    if clean {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Truncate to at most `max_width` columns, appending "..." when cut.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(take_columns(s, max_width));
    }

    let mut out = take_columns(s, max_width - ELLIPSIS_WIDTH);
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}

fn take_columns(s: &str, budget: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
