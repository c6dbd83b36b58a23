// ABOUTME: Unicode-width-aware string measurement, padding and truncation
// Keeps mixed-script labels (CJK counts as 2 cells) aligned in terminal grids

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to at most `max` display cells, appending an ellipsis
/// when anything was cut. A wide character that would straddle the boundary
/// is dropped entirely.
pub fn truncate_width(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    // Reserve one cell for the ellipsis.
    let budget = max - 1;
    let mut width = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw > budget {
            break;
        }
        width += cw;
        out.push(ch);
    }
    out.push('…');
    out
}

/// Pad a string with trailing spaces to exactly `width` display cells,
/// truncating first if it is too long.
pub fn pad_width(s: &str, width: usize) -> String {
    let mut out = truncate_width(s, width);
    let current = display_width(&out);
    for _ in current..width {
        out.push(' ');
    }
    out
}

/// Left-pad a string with spaces to `width` display cells.
pub fn pad_width_left(s: &str, width: usize) -> String {
    let current = display_width(s);
    if current >= width {
        return s.to_string();
    }
    let mut out = String::new();
    for _ in current..width {
        out.push(' ');
    }
    out.push_str(s);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_width_cjk() {
        assert_eq!(display_width("abc"), 3);
        // Hangul syllables are two cells each
        assert_eq!(display_width("구현"), 4);
        assert_eq!(display_width("a구b"), 4);
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_width("hello", 10), "hello");
        assert_eq!(truncate_width("hello world", 8), "hello w…");
        assert_eq!(display_width(&truncate_width("hello world", 8)), 8);
    }

    #[test]
    fn test_truncate_wide_boundary() {
        // "구현하기" is 8 cells; budget 5 leaves 4 for content so a wide
        // char may not straddle the boundary
        let t = truncate_width("구현하기", 5);
        assert!(display_width(&t) <= 5);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn test_pad_width_alignment() {
        assert_eq!(pad_width("ab", 5), "ab   ");
        assert_eq!(display_width(&pad_width("구현", 6)), 6);
        assert_eq!(pad_width_left("7s", 5), "   7s");
    }

    #[test]
    fn test_pad_truncates_overlong() {
        let padded = pad_width("a very long task description", 10);
        assert_eq!(display_width(&padded), 10);
    }
}
