//! Outbound error classification and backoff schedules. Port of
//! `original_source/backend/app/core/failover.py`,
//! `app/pixiv/refresh_backoff.py`, and `app/jobs/backoff.py`'s family of
//! near-identical "schedule then exponential-with-cap" curves.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundErrorKind {
    ProxyConnect,
    ProxyAuth,
    PixivRateLimit,
}

/// Classifies a reqwest error surfaced while talking through a forward
/// proxy. `is_proxy_error` should come from `reqwest::Error::is_connect`
/// (or an explicit tunnel-CONNECT failure) — reqwest does not expose a
/// distinct proxy-vs-origin connect error, so callers pass the message
/// they have and this matches on it the way the original did on the
/// httpx exception string.
pub fn classify_connect_error(message: &str) -> OutboundErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("407") || lower.contains("proxy authentication") {
        OutboundErrorKind::ProxyAuth
    } else {
        OutboundErrorKind::ProxyConnect
    }
}

pub fn classify_pixiv_rate_limit(status_code: u16, body_text: Option<&str>) -> Option<OutboundErrorKind> {
    if status_code != 403 {
        return None;
    }
    let text = body_text.unwrap_or("").trim().to_ascii_lowercase();
    if text.contains("rate limit") {
        Some(OutboundErrorKind::PixivRateLimit)
    } else {
        None
    }
}

pub fn should_override_proxy(kind: OutboundErrorKind) -> bool {
    matches!(kind, OutboundErrorKind::ProxyConnect | OutboundErrorKind::ProxyAuth)
}

pub fn should_backoff_token(kind: OutboundErrorKind) -> bool {
    matches!(kind, OutboundErrorKind::PixivRateLimit)
}

fn scheduled_then_doubling(attempt: i64, schedule: &[(i64, i64)], base: i64, base_attempt: i64, cap: i64) -> i64 {
    if attempt <= 0 {
        return 0;
    }
    if let Some((_, seconds)) = schedule.iter().find(|(a, _)| *a == attempt) {
        return *seconds;
    }
    let seconds = base * 2i64.pow((attempt - base_attempt).max(0) as u32);
    seconds.min(cap)
}

/// Override TTL for a token-proxy binding after a proxy-class failure.
pub fn proxy_override_ttl_seconds(attempt: i64) -> i64 {
    scheduled_then_doubling(attempt, &[(1, 20 * 60), (2, 60 * 60), (3, 6 * 60 * 60)], 6 * 60 * 60, 3, 24 * 60 * 60)
}

/// Token backoff after a detected Pixiv rate-limit response.
pub fn pixiv_rate_limit_backoff_seconds(attempt: i64) -> i64 {
    scheduled_then_doubling(
        attempt,
        &[(1, 60), (2, 5 * 60), (3, 15 * 60), (4, 60 * 60), (5, 6 * 60 * 60)],
        6 * 60 * 60,
        5,
        24 * 60 * 60,
    )
}

/// OAuth refresh backoff: network/transient failures get a short curve,
/// auth-class (400/401/403) responses get a much longer one.
pub fn refresh_backoff_seconds(attempt: i64, status_code: Option<u16>) -> i64 {
    if attempt <= 0 {
        return 0;
    }
    match status_code {
        Some(400) | Some(401) | Some(403) => scheduled_then_doubling(
            attempt,
            &[(1, 3600), (2, 6 * 3600), (3, 24 * 3600), (4, 3 * 24 * 3600), (5, 7 * 24 * 3600)],
            7 * 24 * 3600,
            5,
            30 * 24 * 3600,
        ),
        _ => scheduled_then_doubling(
            attempt,
            &[(1, 5), (2, 30), (3, 120), (4, 600), (5, 1800)],
            1800,
            5,
            6 * 3600,
        ),
    }
}

/// Generic job-retry backoff (§4.F): same curve shape as
/// `refresh_backoff_seconds`'s network branch, used by the job FSM for
/// any handler that doesn't have its own schedule.
pub fn job_backoff_seconds(attempt: i64) -> i64 {
    scheduled_then_doubling(attempt, &[(1, 5), (2, 30), (3, 120), (4, 600), (5, 1800)], 1800, 5, 6 * 3600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_proxy_auth_vs_connect() {
        assert_eq!(classify_connect_error("407 proxy authentication required"), OutboundErrorKind::ProxyAuth);
        assert_eq!(classify_connect_error("connection refused"), OutboundErrorKind::ProxyConnect);
    }

    #[test]
    fn pixiv_rate_limit_requires_403_and_matching_body_text() {
        assert_eq!(classify_pixiv_rate_limit(403, Some("Rate Limit exceeded")), Some(OutboundErrorKind::PixivRateLimit));
        assert_eq!(classify_pixiv_rate_limit(403, Some("forbidden")), None);
        assert_eq!(classify_pixiv_rate_limit(404, Some("rate limit")), None);
    }

    #[test]
    fn proxy_override_ttl_matches_fixed_schedule_then_doubles_capped() {
        assert_eq!(proxy_override_ttl_seconds(1), 1200);
        assert_eq!(proxy_override_ttl_seconds(2), 3600);
        assert_eq!(proxy_override_ttl_seconds(3), 21600);
        assert_eq!(proxy_override_ttl_seconds(4), 43200);
        assert_eq!(proxy_override_ttl_seconds(10), 86400);
    }

    #[test]
    fn pixiv_rate_limit_backoff_matches_fixed_schedule_then_doubles_capped() {
        assert_eq!(pixiv_rate_limit_backoff_seconds(1), 60);
        assert_eq!(pixiv_rate_limit_backoff_seconds(5), 21600);
        assert_eq!(pixiv_rate_limit_backoff_seconds(6), 43200);
        assert_eq!(pixiv_rate_limit_backoff_seconds(20), 86400);
    }

    #[test]
    fn refresh_backoff_auth_class_is_much_longer_than_network_class() {
        assert_eq!(refresh_backoff_seconds(1, Some(401)), 3600);
        assert_eq!(refresh_backoff_seconds(1, None), 5);
        assert_eq!(refresh_backoff_seconds(100, Some(403)), 30 * 24 * 3600);
    }

    #[test]
    fn job_backoff_matches_network_curve() {
        assert_eq!(job_backoff_seconds(1), 5);
        assert_eq!(job_backoff_seconds(5), 1800);
        assert_eq!(job_backoff_seconds(6), 3600);
        assert_eq!(job_backoff_seconds(20), 6 * 3600);
    }
}
