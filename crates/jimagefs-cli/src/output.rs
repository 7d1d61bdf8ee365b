//! Formatted output helpers for CLI commands.

const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

/// Renders an entry size in binary units, one decimal above 1 KiB.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_displays_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
    }

    #[test]
    fn format_bytes_displays_kib() {
        assert_eq!(format_bytes(12_800), "12.5 KiB");
    }

    #[test]
    fn format_bytes_displays_mib_and_gib() {
        assert_eq!(format_bytes(134_217_728), "128.0 MiB");
        assert_eq!(format_bytes(2_147_483_648), "2.0 GiB");
        assert_eq!(format_bytes(4_398_046_511_104), "4096.0 GiB");
    }
}
