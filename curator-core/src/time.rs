use chrono::{DateTime, SecondsFormat, Utc};

/// Current instant formatted as ISO-8601 UTC with millisecond precision
/// and a trailing `Z`, e.g. `2026-07-28T10:15:30.123Z`.
pub fn now_iso_millis() -> String {
    to_iso_millis(Utc::now())
}

pub fn to_iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp as emitted by [`now_iso_millis`].
pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Truncate `text` to at most `max_len` chars, matching the original
/// system's `_truncate` helper used before persisting `last_error`.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_format_has_millis_and_trailing_z() {
        let s = now_iso_millis();
        assert!(s.ends_with('Z'));
        assert!(s.contains('.'));
    }

    #[test]
    fn roundtrip_parse() {
        let s = now_iso_millis();
        let parsed = parse_iso(&s);
        assert!(parsed.is_some());
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("hello", 500), "hello");
    }

    #[test]
    fn truncate_long_text_is_capped() {
        let long = "a".repeat(10);
        let t = truncate(&long, 5);
        assert_eq!(t.chars().count(), 5);
        assert!(t.ends_with('…'));
    }
}
