//! Value-level text transforms: escaping and line folding.
//!
//! On the wire a property value is escaped first and folded second. Decoding
//! runs the other way round: continuation lines are joined back together and
//! only then are escape sequences resolved, so a fold that lands in the middle
//! of an escape sequence is harmless.

/// Maximum number of characters on one physical line.
pub const FOLD_WIDTH: usize = 72;

/// Separator inserted between folded chunks. The leading space marks the
/// next physical line as a continuation.
pub const FOLD_SEPARATOR: &str = "\r\n ";

/// Escapes backslashes, newlines, commas and semicolons.
///
/// Line endings are normalized: `\r\n` and a bare `\r` are both written as
/// `\n`, so the escaped value never contains a raw line break. A decoded value
/// holding a bare `\r` therefore comes back with `\n` in its place.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Resolves `\n`, `\N`, `\,`, `\;` and `\\`.
///
/// Unknown escape sequences and a trailing lone backslash are kept verbatim.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(c @ (',' | ';' | '\\')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Breaks `value` into chunks joined by [`FOLD_SEPARATOR`].
///
/// The first chunk is shortened by `prefix_len`, the length of the `name:`
/// already written on that line. Widths count characters, never splitting a
/// multi-byte character.
pub fn fold(value: &str, prefix_len: usize) -> String {
    let mut out = String::with_capacity(value.len() + (value.len() / FOLD_WIDTH) * 3);
    let mut width = FOLD_WIDTH.saturating_sub(prefix_len).max(1);
    let mut used = 0;

    for ch in value.chars() {
        if used == width {
            out.push_str(FOLD_SEPARATOR);
            width = FOLD_WIDTH;
            used = 0;
        }
        out.push(ch);
        used += 1;
    }

    out
}

/// Joins continuation lines back into one logical value.
pub fn unfold(value: &str) -> String {
    value.replace(FOLD_SEPARATOR, "")
}

/// Turns a raw on-the-wire value into its decoded form.
pub fn decode(raw: &str) -> String {
    unescape(&unfold(raw))
}

/// Turns a decoded value into the folded, escaped text written after `name:`.
pub fn encode(name: &str, value: &str) -> String {
    fold(&escape(value), name.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
        assert_eq!(escape("line1\r\nline2\rline3"), "line1\\nline2\\nline3");
        assert_eq!(escape("plain text"), "plain text");
    }

    #[test]
    fn bare_carriage_return_is_normalized() {
        assert_eq!(escape("a\rb"), "a\\nb");
        assert_eq!(decode(&encode("X", "a\rb\r\nc")), "a\nb\nc");
    }

    #[test]
    fn unescape_known_sequences() {
        assert_eq!(unescape("a\\,b\\;c\\\\d\\ne\\Nf"), "a,b;c\\d\ne\nf");
    }

    #[test]
    fn unescape_keeps_unknown_sequences() {
        assert_eq!(unescape("C:\\temp"), "C:\\temp");
        assert_eq!(unescape("ends with\\"), "ends with\\");
    }

    #[test]
    fn fold_respects_prefix_on_first_line() {
        let value = "x".repeat(200);
        let folded = fold(&value, 12);
        let lines: Vec<&str> = folded.split("\r\n").collect();

        assert_eq!(lines[0].len(), FOLD_WIDTH - 12);
        assert_eq!(lines[1].len(), FOLD_WIDTH + 1);
        assert!(lines[1].starts_with(' '));
        assert_eq!(unfold(&folded), value);
    }

    #[test]
    fn fold_short_value_is_untouched() {
        assert_eq!(fold("short", 8), "short");
        assert_eq!(fold("", 8), "");
    }

    #[test]
    fn fold_does_not_split_multibyte_characters() {
        let value = "é".repeat(100);
        let folded = fold(&value, 0);
        assert_eq!(unfold(&folded), value);
        assert!(folded.split("\r\n").all(|line| line.trim_start().chars().count() <= FOLD_WIDTH));
    }

    #[test]
    fn fold_with_oversized_prefix_still_progresses() {
        let folded = fold("abc", 200);
        assert_eq!(unfold(&folded), "abc");
    }

    #[test]
    fn fold_and_escape_are_inverted_by_decode() {
        let original = "Group 3: 9 miles, hard; finish\\strong\nWorkouts:\n1. https://example.com/a,b;c\n"
            .repeat(4);
        let wire = encode("DESCRIPTION", &original);

        assert!(wire.split("\r\n").skip(1).all(|line| line.starts_with(' ')));
        assert_eq!(decode(&wire), original);
    }

    #[test]
    fn fold_splitting_an_escape_sequence_is_harmless() {
        // With the two-character "X:" prefix the first line holds 70
        // characters, so the backslash of "\," is the last one on it.
        let original = format!("{},tail", "y".repeat(69));
        let wire = encode("X", &original);
        assert_eq!(decode(&wire), original);
    }
}
