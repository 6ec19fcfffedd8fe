//! HTTP date formatting and parsing, matching `Day, DD Mon YYYY HH:MM:SS TZ`.

use chrono::{DateTime, Utc};

const HTTP_DATE_FMT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a Unix timestamp (seconds) as an HTTP `Date`/`Last-Modified` value.
pub fn format_http_date(timestamp: i64) -> String {
    let dt = DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    dt.format(HTTP_DATE_FMT).to_string()
}

/// Parse an `If-Modified-Since` header value into a Unix timestamp.
///
/// Returns `None` on anything unparsable; callers treat that as "proceed with
/// the normal body" rather than an error.
pub fn parse_http_date(value: &str) -> Option<i64> {
    chrono::NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
        .map(|naive| naive.and_utc().timestamp())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_format_and_parse() {
        let ts = 1_700_000_000;
        let formatted = format_http_date(ts);
        let parsed = parse_http_date(&formatted).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_http_date("not a date").is_none());
    }
}
