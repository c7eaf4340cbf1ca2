use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Ellipsis appended to shortened text.
const ELLIPSIS: &str = "...";

/// Number of characters kept from a feed entry's body when building an excerpt.
pub const EXCERPT_CHARS: usize = 200;

/// Builds an excerpt from the head of `content`.
///
/// Takes the first [`EXCERPT_CHARS`] characters (not bytes, so multi-byte
/// text never splits a code point), trims surrounding whitespace and appends
/// `"..."`. The result is therefore at most 203 characters long.
///
/// # Examples
///
/// ```
/// use presswire::util::excerpt_head;
///
/// assert_eq!(excerpt_head("  Hello world  "), "Hello world...");
/// assert_eq!(excerpt_head(&"a".repeat(500)).chars().count(), 203);
/// ```
pub fn excerpt_head(content: &str) -> String {
    let head: String = content.chars().take(EXCERPT_CHARS).collect();
    format!("{}{}", head.trim(), ELLIPSIS)
}

/// Calculates the display width of a string in terminal columns.
///
/// CJK characters and most emoji occupy two columns, combining marks zero.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Shortens `s` so that it occupies at most `max_width` terminal columns.
///
/// When the text does not fit, it is cut at a character boundary and `"..."`
/// is appended. Widths too narrow to hold a character plus the ellipsis
/// return as many whole characters as fit, without an ellipsis.
///
/// Returns `Cow::Borrowed` when no shortening is needed.
///
/// # Examples
///
/// ```
/// use presswire::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let ellipsis_width = ELLIPSIS.len();
    let (budget, suffix) = if max_width <= ellipsis_width {
        (max_width, "")
    } else {
        (max_width - ellipsis_width, ELLIPSIS)
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], suffix))
}

/// Removes terminal control characters and ANSI escape sequences.
///
/// Scraped titles and feed text are printed to the terminal by the CLI, so
/// anything that could move the cursor or rewrite the window title is
/// dropped. Tab, newline and carriage return are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_control(c: char) -> bool {
        c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
    }

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            // CSI: parameters until a final byte in 0x40..=0x7e
            Some('[') => {
                chars.next();
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            // OSC: until BEL or ST (ESC \)
            Some(']') => {
                chars.next();
                while let Some(next) = chars.next() {
                    if next == '\x07' {
                        break;
                    }
                    if next == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
