//! Human-readable byte sizes for artifact logging.

/// Format a byte count with binary suffixes, keeping the number short
/// (e.g., "812B", "1.5KiB", "400KiB", "3.2MiB").
pub fn format_size(bytes: u64) -> String {
    const SUFFIXES: &[&str] = &["KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut suffix = None;
    for s in SUFFIXES {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        suffix = Some(*s);
    }

    match suffix {
        None => format!("{bytes}B"),
        // single leading digit leaves room for one fractional digit
        Some(s) if value < 10.0 => format!("{value:.1}{s}"),
        Some(s) => format!("{value:.0}{s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1), "1B");
        assert_eq!(format_size(1023), "1023B");
        assert_eq!(format_size(1024), "1.0KiB");
        assert_eq!(format_size(1536), "1.5KiB");
        assert_eq!(format_size(10 * 1024), "10KiB");
        assert_eq!(format_size(400 * 1024), "400KiB");
        assert_eq!(format_size(3 * 1024 * 1024 + 200 * 1024), "3.2MiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0GiB");
    }
}
