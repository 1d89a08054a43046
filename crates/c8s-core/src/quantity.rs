//! Minimal arithmetic over Kubernetes resource quantity strings (cpu/memory),
//! needed by the quota validator (section 4.5) to sum requests and compare
//! against `hard - used` on a `ResourceQuota`. `k8s_openapi::Quantity` is a
//! bare string newtype with no parsing of its own, so this fills that gap.

use crate::Error;

/// Parse a cpu quantity (`"500m"`, `"2"`, `"0.5"`) into millicores.
pub fn parse_cpu_millis(s: &str) -> Result<i64, Error> {
    let s = s.trim();
    if let Some(milli) = s.strip_suffix('m') {
        return milli
            .parse::<i64>()
            .map_err(|_| Error::validation(format!("invalid cpu quantity: {s}")));
    }
    let cores: f64 = s
        .parse()
        .map_err(|_| Error::validation(format!("invalid cpu quantity: {s}")))?;
    Ok((cores * 1000.0).round() as i64)
}

/// Parse a memory quantity (`"512Mi"`, `"1Gi"`, `"1000000"`, `"2G"`) into bytes.
pub fn parse_memory_bytes(s: &str) -> Result<i64, Error> {
    let s = s.trim();
    const BINARY: &[(&str, i64)] = &[
        ("Ki", 1024),
        ("Mi", 1024 * 1024),
        ("Gi", 1024 * 1024 * 1024),
        ("Ti", 1024i64.pow(4)),
        ("Pi", 1024i64.pow(5)),
        ("Ei", 1024i64.pow(6)),
    ];
    const DECIMAL: &[(&str, i64)] = &[
        ("k", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
        ("P", 1_000_000_000_000_000),
        ("E", 1_000_000_000_000_000_000),
    ];

    for (suffix, multiplier) in BINARY.iter().chain(DECIMAL.iter()) {
        if let Some(value) = s.strip_suffix(suffix) {
            let n: f64 = value
                .parse()
                .map_err(|_| Error::validation(format!("invalid memory quantity: {s}")))?;
            return Ok((n * *multiplier as f64).round() as i64);
        }
    }

    let bytes: f64 = s
        .parse()
        .map_err(|_| Error::validation(format!("invalid memory quantity: {s}")))?;
    Ok(bytes.round() as i64)
}

/// Format bytes back into the most legible binary-suffixed form, for
/// deficit messages (`"exceeded memory by 512Mi"`).
pub fn format_memory_bytes(bytes: i64) -> String {
    const UNITS: &[(&str, i64)] = &[
        ("Gi", 1024 * 1024 * 1024),
        ("Mi", 1024 * 1024),
        ("Ki", 1024),
    ];
    for (suffix, divisor) in UNITS {
        if bytes % divisor == 0 && bytes / divisor != 0 {
            return format!("{}{suffix}", bytes / divisor);
        }
    }
    bytes.to_string()
}

/// Format millicores back into the conventional `"<n>m"` form.
pub fn format_cpu_millis(millis: i64) -> String {
    format!("{millis}m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_plain_cores() {
        assert_eq!(parse_cpu_millis("2").unwrap(), 2000);
        assert_eq!(parse_cpu_millis("0.5").unwrap(), 500);
    }

    #[test]
    fn cpu_millis_suffix() {
        assert_eq!(parse_cpu_millis("250m").unwrap(), 250);
    }

    #[test]
    fn memory_binary_suffix() {
        assert_eq!(parse_memory_bytes("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_bytes("512Mi").unwrap(), 512 * 1024 * 1024);
    }

    #[test]
    fn memory_decimal_suffix() {
        assert_eq!(parse_memory_bytes("1G").unwrap(), 1_000_000_000);
    }

    #[test]
    fn memory_bare_bytes() {
        assert_eq!(parse_memory_bytes("1000000").unwrap(), 1_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_cpu_millis("banana").is_err());
        assert!(parse_memory_bytes("banana").is_err());
    }

    #[test]
    fn format_roundtrips_common_values() {
        assert_eq!(format_memory_bytes(1024 * 1024 * 1024), "1Gi");
        assert_eq!(format_cpu_millis(250), "250m");
    }
}
