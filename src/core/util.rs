//! Small display/formatting helpers.

use chrono::{DateTime, Local, Utc};

/// Render a number of seconds as a compact human duration, e.g. `2d 3h`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Render a unix timestamp in local time.
pub fn format_timestamp(epoch: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch, 0) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => epoch.to_string(),
    }
}

/// Timestamp suffix for backup file names.
pub fn backup_suffix() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_buckets() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(75), "1m 15s");
        assert_eq!(format_duration(3_900), "1h 5m");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[test]
    fn timestamp_falls_back_on_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }
}
