//! Credential selection. Port of
//! `original_source/backend/app/pixiv/token_strategy.py`.

use curator_core::domain::PixivToken;
use curator_core::time::now_iso_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectStrategy {
    RoundRobin,
    LeastError,
    Weighted,
}

impl SelectStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "" => Some(SelectStrategy::RoundRobin),
            "least_error" => Some(SelectStrategy::LeastError),
            "weighted" => Some(SelectStrategy::Weighted),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("no eligible token available")]
    NoTokenAvailable { next_retry_at: Option<String> },
}

fn is_eligible(token: &PixivToken, now: &str) -> bool {
    if !token.enabled {
        return false;
    }
    match &token.backoff_until {
        Some(until) => until.as_str() <= now,
        None => true,
    }
}

fn eligible_sorted(tokens: &[PixivToken], now: &str) -> Vec<&PixivToken> {
    let mut out: Vec<&PixivToken> = tokens.iter().filter(|t| is_eligible(t, now)).collect();
    out.sort_by_key(|t| t.id);
    out
}

fn next_retry_at(tokens: &[PixivToken]) -> Option<String> {
    tokens
        .iter()
        .filter(|t| t.enabled)
        .filter_map(|t| t.backoff_until.clone())
        .min()
}

fn choose_round_robin<'a>(tokens: &[&'a PixivToken], last_id: Option<i64>) -> &'a PixivToken {
    match last_id {
        None => tokens[0],
        Some(last) => match tokens.iter().position(|t| t.id == last) {
            Some(idx) => tokens[(idx + 1) % tokens.len()],
            None => tokens[0],
        },
    }
}

fn choose_weighted<'a>(tokens: &[&'a PixivToken], r: f64, last_id: Option<i64>) -> &'a PixivToken {
    let weights: Vec<f64> = tokens.iter().map(|t| t.weight.max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return choose_round_robin(tokens, last_id);
    }
    let r = r.clamp(0.0, 0.999_999_999);
    let mut target = r * total;
    let mut chosen = tokens[0];
    for (token, w) in tokens.iter().zip(weights.iter()) {
        if *w <= 0.0 {
            continue;
        }
        chosen = token;
        if target < *w {
            return token;
        }
        target -= *w;
    }
    chosen
}

/// Returns the chosen token and its id, given `now` (ISO-8601) and the
/// previously-chosen id for round-robin/least-error continuity.
pub fn choose_token<'a>(
    tokens: &'a [PixivToken],
    strategy: SelectStrategy,
    now: &str,
    last_id: Option<i64>,
    r: f64,
) -> Result<(&'a PixivToken, i64), SelectError> {
    let eligible = eligible_sorted(tokens, now);
    if eligible.is_empty() {
        return Err(SelectError::NoTokenAvailable {
            next_retry_at: next_retry_at(tokens),
        });
    }

    let token = match strategy {
        SelectStrategy::RoundRobin => choose_round_robin(&eligible, last_id),
        SelectStrategy::LeastError => {
            let min_err = eligible.iter().map(|t| t.error_count).min().unwrap();
            let best: Vec<&PixivToken> = eligible
                .into_iter()
                .filter(|t| t.error_count == min_err)
                .collect();
            choose_round_robin(&best, last_id)
        }
        SelectStrategy::Weighted => choose_weighted(&eligible, r, last_id),
    };
    Ok((token, token.id))
}

pub fn choose_token_now(
    tokens: &[PixivToken],
    strategy: SelectStrategy,
    last_id: Option<i64>,
    r: f64,
) -> Result<(&PixivToken, i64), SelectError> {
    let now = now_iso_millis();
    choose_token(tokens, strategy, &now, last_id, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: i64, enabled: bool, weight: f64, error_count: i64, backoff_until: Option<&str>) -> PixivToken {
        PixivToken {
            id,
            label: None,
            refresh_token_enc: "ct".into(),
            enabled,
            weight,
            error_count,
            backoff_until: backoff_until.map(String::from),
            last_ok_at: None,
            last_fail_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn round_robin_advances_from_last_id() {
        let tokens = vec![token(1, true, 1.0, 0, None), token(2, true, 1.0, 0, None), token(3, true, 1.0, 0, None)];
        let (t, id) = choose_token(&tokens, SelectStrategy::RoundRobin, "2026-01-01T00:00:00.000Z", Some(2), 0.0).unwrap();
        assert_eq!(id, 3);
        assert_eq!(t.id, 3);
    }

    #[test]
    fn round_robin_wraps_around() {
        let tokens = vec![token(1, true, 1.0, 0, None), token(2, true, 1.0, 0, None)];
        let (_, id) = choose_token(&tokens, SelectStrategy::RoundRobin, "2026-01-01T00:00:00.000Z", Some(2), 0.0).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn backoff_tokens_are_excluded_until_expiry() {
        let tokens = vec![
            token(1, true, 1.0, 0, Some("2099-01-01T00:00:00.000Z")),
            token(2, true, 1.0, 0, None),
        ];
        let (_, id) = choose_token(&tokens, SelectStrategy::RoundRobin, "2026-01-01T00:00:00.000Z", None, 0.0).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn all_backed_off_is_no_token_available() {
        let tokens = vec![token(1, true, 1.0, 0, Some("2099-01-01T00:00:00.000Z"))];
        let err = choose_token(&tokens, SelectStrategy::RoundRobin, "2026-01-01T00:00:00.000Z", None, 0.0).unwrap_err();
        match err {
            SelectError::NoTokenAvailable { next_retry_at } => assert_eq!(next_retry_at.as_deref(), Some("2099-01-01T00:00:00.000Z")),
        }
    }

    #[test]
    fn least_error_prefers_lowest_error_count() {
        let tokens = vec![token(1, true, 1.0, 5, None), token(2, true, 1.0, 0, None)];
        let (_, id) = choose_token(&tokens, SelectStrategy::LeastError, "2026-01-01T00:00:00.000Z", None, 0.0).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn weighted_picks_proportionally_to_cumulative_weight() {
        let tokens = vec![token(1, true, 1.0, 0, None), token(2, true, 3.0, 0, None)];
        // total=4, r=0.1 -> target=0.4 < w(1)=1.0 -> token 1
        let (_, id) = choose_token(&tokens, SelectStrategy::Weighted, "2026-01-01T00:00:00.000Z", None, 0.1).unwrap();
        assert_eq!(id, 1);
        // r=0.5 -> target=2.0, subtract w(1)=1.0 -> 1.0 < w(2)=3.0 -> token 2
        let (_, id) = choose_token(&tokens, SelectStrategy::Weighted, "2026-01-01T00:00:00.000Z", None, 0.5).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn weighted_falls_back_to_round_robin_when_total_weight_is_zero() {
        let tokens = vec![token(1, true, 0.0, 0, None), token(2, true, 0.0, 0, None)];
        let (_, id) = choose_token(&tokens, SelectStrategy::Weighted, "2026-01-01T00:00:00.000Z", Some(1), 0.9).unwrap();
        assert_eq!(id, 2);
    }
}
