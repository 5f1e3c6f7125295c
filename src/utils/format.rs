// src/utils/format.rs
//! Human-readable numbers for console output

const SCALES: [(f64, &str); 3] = [(1e9, "B"), (1e6, "M"), (1e3, "K")];

/// Scales `n` by the largest suffix it reaches. Billions take `wide` decimals.
fn scaled(n: usize, wide: usize) -> String {
    let x = n as f64;
    SCALES
        .iter()
        .find(|&&(unit, _)| x >= unit)
        .map(|&(unit, suffix)| {
            let decimals = if suffix == "B" { wide } else { 1 };
            format!("{:.*}{}", decimals, x / unit, suffix)
        })
        .unwrap_or_else(|| n.to_string())
}

/// Parameter counts: 85.0M, 1.50B
pub fn format_params(n: usize) -> String {
    scaled(n, 2)
}

/// Sentence and word counts: 12.3K, 2.0M
pub fn format_number(n: usize) -> String {
    scaled(n, 1)
}

/// Wall-clock time as `1h02m05s`; leading zero units are dropped.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m{:02}s", m, s),
        _ => format!("{}h{:02}m{:02}s", h, m, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_params() {
        assert_eq!(format_params(85_000_000), "85.0M");
        assert_eq!(format_params(1_500_000_000), "1.50B");
        assert_eq!(format_params(21_300), "21.3K");
        assert_eq!(format_params(768), "768");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(12_345), "12.3K");
        assert_eq!(format_number(2_000_000), "2.0M");
        assert_eq!(format_number(3_000_000_000), "3.0B");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m05s");
        assert_eq!(format_duration(3725), "1h02m05s");
    }
}
