use chrono::{DateTime, Utc};

/// Current wall-clock time in UTC, the insertion time used whenever a
/// payload's `dateTime` is absent or empty.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an event timestamp per the gateway's timestamp rule: if `raw` is
/// absent or empty, the insertion time is used; otherwise it is parsed as
/// ISO-8601 with a trailing `Z` treated as `+00:00`.
pub fn parse_event_time(raw: Option<&str>) -> DateTime<Utc> {
    match raw {
        Some(s) if !s.is_empty() => parse_iso8601_z(s).unwrap_or_else(now),
        _ => now(),
    }
}

fn parse_iso8601_z(s: &str) -> Option<DateTime<Utc>> {
    let normalized = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        s.to_string()
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_z_equals_explicit_offset() {
        let a = parse_event_time(Some("2024-05-01T12:00:00Z"));
        let b = parse_event_time(Some("2024-05-01T12:00:00+00:00"));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_or_empty_falls_back_to_now() {
        let before = now();
        let missing = parse_event_time(None);
        let empty = parse_event_time(Some(""));
        let after = now();

        assert!(missing >= before && missing <= after);
        assert!(empty >= before && empty <= after);
    }

    #[test]
    fn garbage_input_falls_back_to_now() {
        let before = now();
        let garbage = parse_event_time(Some("not-a-date"));
        let after = now();
        assert!(garbage >= before && garbage <= after);
    }
}
