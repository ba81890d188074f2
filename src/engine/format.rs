//! `minutes:seconds` clock strings for session and countdown display.

use std::time::Duration;

/// Formats whole seconds as `M:SS`. Minutes are not capped at 59.
///
/// ```
/// use stillpoint_lib::engine::format_clock;
///
/// assert_eq!(format_clock(75), "1:15");
/// assert_eq!(format_clock(5), "0:05");
/// ```
pub fn format_clock(total_seconds: u64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Elapsed time, truncated to the second.
pub fn format_elapsed(duration: Duration) -> String {
    format_clock(duration.as_secs())
}

/// Remaining time, rounded up so a countdown shows `0:00` only at the end.
pub fn format_countdown(duration: Duration) -> String {
    let whole = duration.as_secs();
    let seconds = if duration.subsec_nanos() > 0 { whole + 1 } else { whole };
    format_clock(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format_cases() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(5), "0:05");
        assert_eq!(format_clock(75), "1:15");
        assert_eq!(format_clock(599), "9:59");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(3_725), "62:05");
    }

    #[test]
    fn elapsed_truncates_and_countdown_rounds_up() {
        assert_eq!(format_elapsed(Duration::from_millis(59_900)), "0:59");
        assert_eq!(format_countdown(Duration::from_millis(59_100)), "1:00");
        assert_eq!(format_countdown(Duration::ZERO), "0:00");
    }
}
