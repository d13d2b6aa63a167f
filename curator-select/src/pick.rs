//! Ascending-with-wraparound pick over `random_key`, grounded on the
//! algorithm described in spec §4.H: the smallest matching image with
//! `random_key >= r_key`, or the smallest matching overall if none.

use crate::filter::RandomFilter;
use curator_core::domain::Image;
use sqlx::sqlite::Sqlite;
use sqlx::{QueryBuilder, SqlitePool};

pub async fn pick_ascending(
    pool: &SqlitePool,
    filter: &RandomFilter,
    r_key: f64,
    now: &str,
) -> Result<Option<Image>, sqlx::Error> {
    if let Some(image) = pick_one(pool, filter, now, Some(r_key)).await? {
        return Ok(Some(image));
    }
    pick_one(pool, filter, now, None).await
}

async fn pick_one(
    pool: &SqlitePool,
    filter: &RandomFilter,
    now: &str,
    r_key: Option<f64>,
) -> Result<Option<Image>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM images WHERE 1=1");
    filter.push_predicates(&mut qb, now);
    if let Some(key) = r_key {
        qb.push(" AND random_key >= ").push_bind(key);
    }
    qb.push(" ORDER BY random_key ASC LIMIT 1");
    qb.build_query_as::<Image>().fetch_optional(pool).await
}

/// Draw `count` independent ascending picks from distinct sub-seeds
/// derived from `r`, used by the quality-sampling strategy. Candidates
/// are deduplicated by image id.
pub async fn sample_candidates(
    pool: &SqlitePool,
    filter: &RandomFilter,
    r: f64,
    count: usize,
    now: &str,
) -> Result<Vec<Image>, sqlx::Error> {
    let mut out = Vec::with_capacity(count);
    let mut seen = std::collections::HashSet::new();
    for i in 0..count {
        let sub_r = sub_seed(r, i as u64);
        if let Some(image) = pick_ascending(pool, filter, sub_r, now).await? {
            if seen.insert(image.id) {
                out.push(image);
            }
        }
    }
    Ok(out)
}

/// Stably derive the n-th sub-seed from a base `r` in `[0, 1)`, keeping
/// the whole sampling pass reproducible for a fixed `r`.
fn sub_seed(r: f64, n: u64) -> f64 {
    let mixed = (r.to_bits() ^ n.wrapping_mul(0x9E3779B97F4A7C15)) as f64;
    let frac = (mixed / u64::MAX as f64).abs().fract();
    frac.clamp(0.0, 0.999_999_999)
}

/// Derive a stable `r_key` in `[0, 1)` from a string seed, used when the
/// caller supplies `seed` instead of a literal `r`.
pub fn seed_to_r_key(seed: &str) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let hash = hasher.finish();
    (hash as f64 / u64::MAX as f64).clamp(0.0, 0.999_999_999)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_to_r_key_is_deterministic_and_in_range() {
        let a = seed_to_r_key("abc");
        let b = seed_to_r_key("abc");
        let c = seed_to_r_key("xyz");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!((0.0..1.0).contains(&a));
        assert!((0.0..1.0).contains(&c));
    }

    #[test]
    fn sub_seed_varies_by_index_and_stays_in_range() {
        let s0 = sub_seed(0.42, 0);
        let s1 = sub_seed(0.42, 1);
        assert_ne!(s0, s1);
        assert!((0.0..1.0).contains(&s0));
        assert!((0.0..1.0).contains(&s1));
    }
}
