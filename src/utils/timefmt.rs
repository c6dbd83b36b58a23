// ABOUTME: Compact elapsed-time formatting for dashboard rows
// Renders durations as "now", "42s", "27m", "1h59m", "2d"

use chrono::Duration;

/// Format an elapsed duration compactly. Negative durations render as "-".
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::zero() {
        return "-".to_string();
    }

    let seconds = elapsed.num_seconds();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if seconds < 5 {
        "now".to_string()
    } else if seconds < 60 {
        format!("{}s", seconds)
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if hours < 24 {
        let remain_min = minutes % 60;
        if remain_min > 0 {
            format!("{}h{}m", hours, remain_min)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}d", days)
    }
}

/// Format a token count compactly: 1234 -> "1.2K", 3400000 -> "3.4M".
pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_boundaries() {
        assert_eq!(format_elapsed(Duration::seconds(-1)), "-");
        assert_eq!(format_elapsed(Duration::seconds(0)), "now");
        assert_eq!(format_elapsed(Duration::seconds(4)), "now");
        assert_eq!(format_elapsed(Duration::seconds(5)), "5s");
        assert_eq!(format_elapsed(Duration::seconds(59)), "59s");
        assert_eq!(format_elapsed(Duration::seconds(60)), "1m");
        assert_eq!(format_elapsed(Duration::minutes(59)), "59m");
        assert_eq!(format_elapsed(Duration::minutes(60)), "1h");
        assert_eq!(format_elapsed(Duration::minutes(119)), "1h59m");
        assert_eq!(format_elapsed(Duration::hours(24)), "1d");
        assert_eq!(format_elapsed(Duration::hours(49)), "2d");
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_200), "1.2K");
        assert_eq!(format_tokens(4_500), "4.5K");
        assert_eq!(format_tokens(3_400_000), "3.4M");
    }
}
