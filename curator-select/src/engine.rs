use crate::dedup::DedupWindow;
use crate::filter::{FilterError, RandomFilter};
use crate::pick::{pick_ascending, sample_candidates};
use crate::quality::{pick_best, pick_softmax, QualityMode, QualityWeights};
use curator_core::domain::Image;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Default,
    Quality,
}

pub struct SelectConfig {
    pub strategy: Strategy,
    pub quality_samples: usize,
    pub quality_mode: QualityMode,
    pub quality_weights: QualityWeights,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            quality_samples: 8,
            quality_mode: QualityMode::Softmax,
            quality_weights: QualityWeights::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Composes filter validation, the ascending pick, the quality
/// oversampler, and the dedup soft-penalty into the single entry point
/// the `/random` handler calls.
pub async fn select_image(
    pool: &SqlitePool,
    filter: &RandomFilter,
    config: &SelectConfig,
    r: f64,
    dedup: Option<&DedupWindow>,
) -> Result<Option<Image>, SelectError> {
    filter.validate()?;
    let now = curator_core::time::now_iso_millis();

    match config.strategy {
        Strategy::Default => Ok(pick_ascending(pool, filter, r, &now).await?),
        Strategy::Quality => {
            let candidates = sample_candidates(pool, filter, r, config.quality_samples, &now).await?;
            if candidates.is_empty() {
                return Ok(None);
            }
            let chosen = select_by_quality(&candidates, config, r, dedup);
            Ok(chosen.cloned())
        }
    }
}

fn select_by_quality<'a>(
    candidates: &'a [Image],
    config: &SelectConfig,
    r: f64,
    dedup: Option<&DedupWindow>,
) -> Option<&'a Image> {
    let now = chrono::Utc::now();
    if let Some(dedup) = dedup {
        let mut scored: Vec<(&Image, f64)> = candidates
            .iter()
            .map(|img| {
                let base = crate::quality::score(img, &config.quality_weights, &now);
                let penalty = dedup.penalty_for(img.id, img.user_id);
                (img, base * penalty)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        return scored.first().map(|(img, _)| *img);
    }

    match config.quality_mode {
        QualityMode::Best => pick_best(candidates, &config.quality_weights, &now),
        QualityMode::Softmax => pick_softmax(candidates, &config.quality_weights, &now, r),
    }
}
