// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Time Resolution
//!
//! Event time comes from a configured header when the delivery carries it, and
//! from the ingestion clock otherwise. A header that is present but cannot be
//! parsed is an error; the delivery is then requeued rather than stamped with a
//! made-up time.

use crate::{
    delivery::{HeaderValue, Headers},
    errors::AmqpError,
};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp attached to every forwarded record.
pub type EventTime = DateTime<Utc>;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Resolves the event time of a delivery from an optional header, falling back
/// to the ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeResolver {
    header: Option<String>,
}

impl TimeResolver {
    /// Creates a resolver reading the event time from `header`.
    ///
    /// # Parameters
    /// * `header` - Name of the time header, `None` to always use the current time
    ///
    /// # Returns
    /// A new time resolver
    pub fn new(header: Option<&str>) -> Self {
        TimeResolver {
            header: header.map(str::to_owned),
        }
    }

    /// Resolves the event time of one delivery.
    ///
    /// A configured header that is present but unparseable yields
    /// `AmqpError::TimeParseError`; it never falls back to the current time.
    pub fn resolve(&self, headers: &Headers) -> Result<EventTime, AmqpError> {
        let Some((name, value)) = self
            .header
            .as_ref()
            .and_then(|name| headers.get(name).map(|value| (name, value)))
        else {
            return Ok(Utc::now());
        };

        parse_header(value).ok_or_else(|| AmqpError::TimeParseError {
            header: name.clone(),
            value: value.to_string(),
        })
    }
}

fn parse_header(value: &HeaderValue) -> Option<EventTime> {
    match value {
        HeaderValue::Text(text) => parse_text(text.trim()),
        HeaderValue::Timestamp(secs) => DateTime::from_timestamp(i64::try_from(*secs).ok()?, 0),
        HeaderValue::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        HeaderValue::Float(_) | HeaderValue::Boolean(_) => None,
    }
}

/// Accepts RFC 3339, RFC 2822 and zone-less `YYYY-MM-DD HH:MM:SS` (read as UTC).
fn parse_text(text: &str) -> Option<EventTime> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }

    if let Ok(time) = DateTime::parse_from_rfc2822(text) {
        return Some(time.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(name: &str, value: HeaderValue) -> Headers {
        let mut headers = Headers::default();
        headers.insert(name.to_owned(), value);
        headers
    }

    fn new_year() -> EventTime {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_rfc3339_header() {
        let resolver = TimeResolver::new(Some("x-sent-at"));
        let hdrs = headers("x-sent-at", HeaderValue::from("2024-01-01T00:00:00Z"));

        assert_eq!(resolver.resolve(&hdrs).unwrap(), new_year());
    }

    #[test]
    fn parses_offsets_and_other_layouts() {
        let resolver = TimeResolver::new(Some("x-sent-at"));

        for text in [
            "2024-01-01T02:00:00+02:00",
            "Mon, 1 Jan 2024 00:00:00 +0000",
            "2024-01-01 00:00:00",
        ] {
            let hdrs = headers("x-sent-at", HeaderValue::from(text));
            assert_eq!(resolver.resolve(&hdrs).unwrap(), new_year(), "{}", text);
        }
    }

    #[test]
    fn amqp_timestamps_are_epoch_seconds() {
        let resolver = TimeResolver::new(Some("x-sent-at"));

        let hdrs = headers("x-sent-at", HeaderValue::Timestamp(1704067200));
        assert_eq!(resolver.resolve(&hdrs).unwrap(), new_year());

        let hdrs = headers("x-sent-at", HeaderValue::Integer(1704067200));
        assert_eq!(resolver.resolve(&hdrs).unwrap(), new_year());
    }

    #[test]
    fn malformed_header_is_an_error() {
        let resolver = TimeResolver::new(Some("x-sent-at"));
        let hdrs = headers("x-sent-at", HeaderValue::from("yesterday-ish"));

        match resolver.resolve(&hdrs) {
            Err(AmqpError::TimeParseError { header, value }) => {
                assert_eq!(header, "x-sent-at");
                assert_eq!(value, "yesterday-ish");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_header_uses_ingestion_clock() {
        let resolver = TimeResolver::new(Some("x-sent-at"));

        let before = Utc::now();
        let first = resolver.resolve(&Headers::default()).unwrap();
        let second = resolver.resolve(&Headers::default()).unwrap();
        let after = Utc::now();

        assert!(before <= first);
        assert!(first <= second);
        assert!(second <= after);
    }

    #[test]
    fn unconfigured_header_ignores_metadata() {
        let resolver = TimeResolver::default();
        let hdrs = headers("x-sent-at", HeaderValue::from("2024-01-01T00:00:00Z"));

        let before = Utc::now();
        let time = resolver.resolve(&hdrs).unwrap();
        assert!(time >= before);
    }
}
