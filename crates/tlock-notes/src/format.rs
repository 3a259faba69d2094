//! Display helpers: remaining-time strings and escaping untrusted note text

const SEC: u64 = 1;
const MIN: u64 = 60 * SEC;
const HOUR: u64 = 60 * MIN;
const DAY: u64 = 24 * HOUR;

/// Format a remaining duration in the two coarsest applicable units.
///
/// Seconds are rounded up, so 1 ms left still reads `"1s"`:
/// `90_000 → "1m 30s"`, `3_661_000 → "1h 1m"`, `90_000_000 → "1d 1h"`.
/// Negative input reads `"0s"`.
pub fn format_remaining(ms: i64) -> String {
    let secs = (ms.max(0) as u64).div_ceil(1000);

    if secs >= DAY {
        format!("{}d {}h", secs / DAY, (secs % DAY) / HOUR)
    } else if secs >= HOUR {
        format!("{}h {}m", secs / HOUR, (secs % HOUR) / MIN)
    } else if secs >= MIN {
        format!("{}m {}s", secs / MIN, secs % MIN)
    } else {
        format!("{secs}s")
    }
}

/// Escape text for insertion into HTML markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Neutralise terminal control sequences, keeping newlines and tabs.
pub fn escape_terminal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() && c != '\n' && c != '\t' {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_examples() {
        assert_eq!(format_remaining(90_000), "1m 30s");
        assert_eq!(format_remaining(3_661_000), "1h 1m");
        assert_eq!(format_remaining(90_000_000), "1d 1h");
        assert_eq!(format_remaining(30_000), "30s");
        assert_eq!(format_remaining(2 * 86_400_000 + 5 * 3_600_000), "2d 5h");
        assert_eq!(format_remaining(3 * 3_600_000 + 12 * 60_000), "3h 12m");
        assert_eq!(format_remaining(45 * 60_000 + 10_000), "45m 10s");
    }

    #[test]
    fn test_format_rounds_seconds_up() {
        assert_eq!(format_remaining(1), "1s");
        assert_eq!(format_remaining(59_001), "1m 0s");
        assert_eq!(format_remaining(1_200_000), "20m 0s");
    }

    #[test]
    fn test_format_zero_and_negative() {
        assert_eq!(format_remaining(0), "0s");
        assert_eq!(format_remaining(-5_000), "0s");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>'"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;&#39;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_escape_terminal() {
        assert_eq!(escape_terminal("a\u{1b}[31mb\nc"), "a\\u{1b}[31mb\nc");
    }

    proptest! {
        #[test]
        fn format_has_at_most_two_units(ms in 0i64..10_000_000_000) {
            let s = format_remaining(ms);
            prop_assert!(s.split(' ').count() <= 2);
        }

        #[test]
        fn sub_minute_is_whole_seconds(ms in 1i64..=60_000) {
            let s = format_remaining(ms);
            let expected = (ms + 999) / 1000;
            if expected < 60 {
                prop_assert_eq!(s, format!("{expected}s"));
            } else {
                prop_assert_eq!(s, "1m 0s".to_string());
            }
        }

        #[test]
        fn escaped_html_has_no_markup(text in ".{0,64}") {
            let escaped = escape_html(&text);
            prop_assert!(!escaped.contains('<'));
            prop_assert!(!escaped.contains('>'));
        }
    }
}
