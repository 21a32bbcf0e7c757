//! Search-engine time values (`"10m"`, `"30s"`, `"500ms"`), used for scroll
//! keep-alive durations.

use std::time::Duration;

use shardscan_common::{Result, error::Error};

const UNITS: [(&str, u128); 7] = [
    ("d", 86_400_000_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("micros", 1_000),
    ("nanos", 1),
];

/// Renders `duration` with the largest unit that represents it exactly.
pub fn format(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    UNITS
        .iter()
        .find(|(_, unit_nanos)| nanos % unit_nanos == 0)
        .map(|(suffix, unit_nanos)| format!("{}{suffix}", nanos / unit_nanos))
        .unwrap_or_else(|| format!("{nanos}nanos"))
}

/// Parses a time value. The unit suffix is mandatory.
pub fn parse(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::invalid_arg("time_value", format!("missing unit in '{value}'")))?;
    let (digits, suffix) = value.split_at(split);
    let amount = digits
        .parse::<u64>()
        .map_err(|_| Error::invalid_arg("time_value", format!("invalid amount in '{value}'")))?;
    let unit_nanos = UNITS
        .iter()
        .find(|(unit, _)| *unit == suffix)
        .map(|(_, nanos)| *nanos)
        .ok_or_else(|| Error::invalid_arg("time_value", format!("unknown unit in '{value}'")))?;
    let nanos = u128::from(amount) * unit_nanos;
    let secs = u64::try_from(nanos / 1_000_000_000)
        .map_err(|_| Error::invalid_arg("time_value", format!("'{value}' is out of range")))?;
    Ok(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_picks_largest_exact_unit() {
        assert_eq!(format(Duration::from_secs(600)), "10m");
        assert_eq!(format(Duration::from_secs(90)), "90s");
        assert_eq!(format(Duration::from_secs(7200)), "2h");
        assert_eq!(format(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format(Duration::ZERO), "0s");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse(" 30s ").unwrap(), Duration::from_secs(30));
        assert_eq!(parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse("1d").unwrap(), Duration::from_secs(86_400));
        assert!(parse("10").is_err());
        assert!(parse("m").is_err());
        assert!(parse("10y").is_err());
    }
}
