use chrono::{DateTime, NaiveDateTime};
use serde::Serializer;

/// Format a wall-clock time the way the API expects measurement dates:
/// millisecond ISO-8601 with a `Z` suffix, without converting to UTC.
pub fn format_local_iso(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a server timestamp. The API sends offset-less local times, but
/// RFC 3339 values are accepted too.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

pub(crate) fn serialize_optional_local_iso<S>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_str(&format_local_iso(dt)),
        None => serializer.serialize_none(),
    }
}

/// Format a height in total inches as feet and inches, e.g. `5'8"`
pub fn format_height(total_inches: u32) -> String {
    format!("{}'{}\"", total_inches / 12, total_inches % 12)
}

/// Format an optional measurement with its unit, or a dash if absent
pub fn format_measurement(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1} {}", v, unit),
        None => "-".to_string(),
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_local_iso() {
        let dt = parse_timestamp("2024-01-31T23:59:58.5").expect("parse");
        assert_eq!(format_local_iso(&dt), "2024-01-31T23:59:58.500Z");
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-05-01T08:30:00").is_some());
        assert!(parse_timestamp("2024-05-01T08:30:00.123456").is_some());
        assert_eq!(
            parse_timestamp("2024-05-01T08:30:00+02:00").map(|d| d.to_string()),
            Some("2024-05-01 08:30:00".to_string())
        );
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_height() {
        assert_eq!(format_height(68), "5'8\"");
        assert_eq!(format_height(72), "6'0\"");
    }

    #[test]
    fn test_format_measurement() {
        assert_eq!(format_measurement(Some(72.26), "kg"), "72.3 kg");
        assert_eq!(format_measurement(None, "kg"), "-");
        assert_eq!(format_optional(&None, "never"), "never");
    }
}
