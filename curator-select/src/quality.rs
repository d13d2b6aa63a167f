//! Quality-score/softmax oversampling strategy described in spec §4.H's
//! "quality strategy" paragraph: score each of `quality_samples`
//! candidates by a weighted sum of normalized popularity signals with
//! freshness decay, then either take the best score or draw weighted by
//! `softmax(score / temperature)`.

use curator_core::domain::Image;

#[derive(Debug, Clone)]
pub struct QualityWeights {
    pub bookmark_weight: f64,
    pub view_weight: f64,
    pub freshness_half_life_days: f64,
    pub ai_multiplier: f64,
    pub manga_multiplier: f64,
    pub temperature: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            bookmark_weight: 0.7,
            view_weight: 0.3,
            freshness_half_life_days: 365.0,
            ai_multiplier: 1.0,
            manga_multiplier: 1.0,
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    Best,
    Softmax,
}

fn normalize_log(value: Option<i64>) -> f64 {
    (value.unwrap_or(0).max(0) as f64 + 1.0).ln()
}

fn freshness_decay(created_at_pixiv: Option<&str>, now: &chrono::DateTime<chrono::Utc>, half_life_days: f64) -> f64 {
    let Some(created) = created_at_pixiv.and_then(curator_core::time::parse_iso) else {
        return 1.0;
    };
    let age_days = (*now - created).num_seconds() as f64 / 86_400.0;
    if age_days <= 0.0 || half_life_days <= 0.0 {
        return 1.0;
    }
    0.5_f64.powf(age_days / half_life_days)
}

pub fn score(image: &Image, weights: &QualityWeights, now: &chrono::DateTime<chrono::Utc>) -> f64 {
    let popularity = weights.bookmark_weight * normalize_log(image.bookmark_count)
        + weights.view_weight * normalize_log(image.view_count);
    let freshness = freshness_decay(image.created_at_pixiv.as_deref(), now, weights.freshness_half_life_days);
    let mut s = popularity * freshness;
    if image.ai_type == Some(1) {
        s *= weights.ai_multiplier;
    }
    if image.illust_type == Some(1) {
        s *= weights.manga_multiplier;
    }
    s
}

/// Pick the candidate with the highest score; ties broken by the first
/// (lowest-`random_key`) candidate in the list.
pub fn pick_best<'a>(candidates: &'a [Image], weights: &QualityWeights, now: &chrono::DateTime<chrono::Utc>) -> Option<&'a Image> {
    candidates
        .iter()
        .max_by(|a, b| score(a, weights, now).total_cmp(&score(b, weights, now)))
}

/// Draw one candidate from `softmax(score / temperature)`, using `r` in
/// `[0, 1)` as the draw.
pub fn pick_softmax<'a>(
    candidates: &'a [Image],
    weights: &QualityWeights,
    now: &chrono::DateTime<chrono::Utc>,
    r: f64,
) -> Option<&'a Image> {
    if candidates.is_empty() {
        return None;
    }
    let temperature = weights.temperature.max(1e-6);
    let scores: Vec<f64> = candidates.iter().map(|c| score(c, weights, now) / temperature).collect();
    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max_score).exp()).collect();
    let total: f64 = exps.iter().sum();
    if total <= 0.0 {
        return candidates.first();
    }
    let target = r.clamp(0.0, 0.999_999_999) * total;
    let mut cumulative = 0.0;
    for (candidate, weight) in candidates.iter().zip(exps.iter()) {
        cumulative += weight;
        if target < cumulative {
            return Some(candidate);
        }
    }
    candidates.last()
}
