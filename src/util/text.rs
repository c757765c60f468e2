use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of `s` in terminal columns.
///
/// CJK characters and most emoji take two columns, combining marks none.
///
/// ```
/// use newswave::util::display_width;
///
/// assert_eq!(display_width("Markets"), 7);
/// assert_eq!(display_width("日本"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Byte offset of the longest prefix of `s` that fits in `max_width` columns.
fn prefix_end(s: &str, max_width: usize) -> usize {
    let mut width = 0;
    for (idx, c) in s.char_indices() {
        width += UnicodeWidthChar::width(c).unwrap_or(0);
        if width > max_width {
            return idx;
        }
    }
    s.len()
}

/// Shorten `s` to at most `max_width` columns, marking the cut with `...`.
///
/// Widths of three columns or fewer leave no room for a character plus the
/// ellipsis, so the text is cut without one. Never splits a character.
///
/// ```
/// use newswave::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Election night live", 12), "Election ...");
/// assert_eq!(truncate_to_width("Weather", 10), "Weather");
/// assert_eq!(truncate_to_width("Weather", 2), "We");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Borrowed(&s[..prefix_end(s, max_width)]);
    }
    let end = prefix_end(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
}

fn is_stripped_control(c: char) -> bool {
    (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}'
}

/// Remove terminal control characters and ANSI escape sequences.
///
/// Article text comes from a remote server or an imported file and is printed
/// straight to the terminal, so CSI sequences (`ESC [` ... final byte), OSC
/// sequences (`ESC ]` ... BEL or `ESC \`), bare ESC and the other C0 controls
/// plus DEL are dropped. Tab, newline and carriage return are kept.
///
/// Returns the input unchanged (borrowed) when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameter and intermediate bytes, then one final byte
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Collapse all runs of whitespace (including newlines) into single spaces.
///
/// Used for one-line listings of descriptions that may span paragraphs.
pub fn single_line(s: &str) -> Cow<'_, str> {
    let already_single = !s.contains(['\n', '\r', '\t'])
        && !s.contains("  ")
        && s.trim().len() == s.len();
    if already_single {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join(" "))
}
