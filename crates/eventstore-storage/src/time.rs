//! Time normalization for event timestamps
//!
//! Every stored timestamp is an instant in UTC. Callers may hand over
//! timezone-aware values, naive values (interpreted in the store's configured
//! timezone, UTC when none) or ISO-8601 strings.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc,
};

use crate::{Result, StorageError};

/// Naive layouts accepted after RFC 3339 parsing fails
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying layouts with a space separator (RFC 3339 requires `T`)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M%:z"];

/// A caller-supplied event time
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    /// An instant
    Utc(DateTime<Utc>),
    /// A wall-clock time without offset
    Naive(NaiveDateTime),
    /// An ISO-8601 string, parsed when the time is resolved
    Iso(String),
}

impl TimeInput {
    /// Resolve to a UTC instant, interpreting naive values in `zone`
    pub fn resolve(&self, zone: Option<FixedOffset>) -> Result<DateTime<Utc>> {
        match self {
            TimeInput::Utc(dt) => Ok(*dt),
            TimeInput::Naive(naive) => Ok(localize(naive, zone)),
            TimeInput::Iso(text) => parse_iso(text, zone),
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimeInput {
    fn from(dt: DateTime<Tz>) -> Self {
        TimeInput::Utc(dt.with_timezone(&Utc))
    }
}

impl From<NaiveDateTime> for TimeInput {
    fn from(naive: NaiveDateTime) -> Self {
        TimeInput::Naive(naive)
    }
}

impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        TimeInput::Iso(text.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        TimeInput::Iso(text)
    }
}

/// Parse an ISO-8601 datetime string into a UTC instant
pub fn parse_iso(input: &str, zone: Option<FixedOffset>) -> Result<DateTime<Utc>> {
    let text = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(localize(&naive, zone));
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(localize(&naive, zone));
    }

    Err(StorageError::Validation(format!(
        "'{}' is not an ISO-8601 datetime; pass a chrono value or an ISO-8601 string",
        input
    )))
}

/// Parse a timezone option: `UTC`, `Z` or a fixed offset such as `+02:00`
pub fn parse_time_zone(input: &str) -> Result<FixedOffset> {
    let text = input.trim();
    if text.eq_ignore_ascii_case("utc") || text == "Z" {
        return Ok(Utc.fix());
    }
    text.parse::<FixedOffset>()
        .map_err(|e| StorageError::Configuration(format!("invalid time zone '{}': {}", input, e)))
}

/// Express a stored instant in the given offset (UTC when none)
pub fn express(dt: DateTime<Utc>, zone: Option<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_timezone(&zone.unwrap_or_else(|| Utc.fix()))
}

/// Storage form of an instant
pub fn format_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn localize(naive: &NaiveDateTime, zone: Option<FixedOffset>) -> DateTime<Utc> {
    let offset = zone.unwrap_or_else(|| Utc.fix());
    offset
        .from_local_datetime(naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 8, 23)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_naive_is_utc_without_zone() {
        let resolved = TimeInput::from(naive(9, 30)).resolve(None).unwrap();
        assert_eq!(resolved, Utc.from_utc_datetime(&naive(9, 30)));
    }

    #[test]
    fn test_naive_uses_configured_zone() {
        let zone = parse_time_zone("+02:00").unwrap();
        let resolved = TimeInput::from(naive(9, 30)).resolve(Some(zone)).unwrap();
        assert_eq!(resolved, Utc.from_utc_datetime(&naive(7, 30)));
    }

    #[test]
    fn test_iso_variants() {
        let expected = Utc.from_utc_datetime(&naive(9, 30));
        for text in [
            "2019-08-23T09:30:00",
            "2019-08-23 09:30:00",
            "2019-08-23T09:30",
            "2019-08-23T09:30:00Z",
            "2019-08-23T11:30:00+02:00",
            "2019-08-23 11:30:00+02:00",
        ] {
            assert_eq!(parse_iso(text, None).unwrap(), expected, "{}", text);
        }

        let midnight = parse_iso("2019-08-23", None).unwrap();
        assert_eq!(midnight, Utc.from_utc_datetime(&naive(0, 0)));
    }

    #[test]
    fn test_malformed_iso_is_validation_error() {
        let err = TimeInput::from("23/08/2019 09:30").resolve(None).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn test_time_zone_parsing() {
        assert_eq!(parse_time_zone("UTC").unwrap(), Utc.fix());
        assert_eq!(parse_time_zone("-05:00").unwrap().local_minus_utc(), -5 * 3600);
        assert!(matches!(
            parse_time_zone("Mars/Olympus"),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_express_and_format() {
        let dt = Utc.from_utc_datetime(&naive(9, 30));
        let zone = parse_time_zone("+02:00").unwrap();
        assert_eq!(express(dt, Some(zone)).to_rfc3339(), "2019-08-23T11:30:00+02:00");
        assert_eq!(format_time(&dt), "2019-08-23T09:30:00Z");
    }
}
