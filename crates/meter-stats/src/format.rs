//! Human-readable byte and speed formatting.

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format bytes to human readable string.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a rate in bytes/second.
#[allow(clippy::cast_precision_loss)]
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= MB as f64 {
        format!("{:.2} MB/s", bytes_per_sec / MB as f64)
    } else if bytes_per_sec >= KB as f64 {
        format!("{:.2} KB/s", bytes_per_sec / KB as f64)
    } else {
        format!("{bytes_per_sec:.0} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * MB), "10.00 MB");
        assert_eq!(format_bytes(3 * GB + GB / 4), "3.25 GB");
        assert_eq!(format_bytes(2048 * GB), "2048.00 GB");
    }

    #[test]
    fn speeds() {
        assert_eq!(format_speed(0.0), "0 B/s");
        assert_eq!(format_speed(999.4), "999 B/s");
        assert_eq!(format_speed(2048.0), "2.00 KB/s");
        assert_eq!(format_speed(5.5 * MB as f64), "5.50 MB/s");
    }
}
