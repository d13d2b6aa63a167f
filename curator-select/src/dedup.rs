//! In-process dedup window: excludes images and authors seen within
//! `window_s`, not a hard filter — a soft penalty applied to candidate
//! scores before picking. Grounded on the teacher's `DashMap`-backed
//! shared-mutable-state idiom (`access_token_cache`'s cache map), here
//! guarded by a single `Mutex` since writes are infrequent and ordering
//! (oldest-eviction) matters.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Seen {
    image_id: i64,
    author_id: Option<i64>,
    at: Instant,
}

pub struct DedupWindow {
    window: Duration,
    image_penalty: f64,
    author_penalty: f64,
    seen: Mutex<VecDeque<Seen>>,
}

impl DedupWindow {
    pub fn new(window_s: u64, image_penalty: f64, author_penalty: f64) -> Self {
        Self {
            window: Duration::from_secs(window_s),
            image_penalty,
            author_penalty,
            seen: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, image_id: i64, author_id: Option<i64>) {
        let mut seen = self.seen.lock().unwrap();
        self.evict_expired(&mut seen);
        seen.push_back(Seen { image_id, author_id, at: Instant::now() });
    }

    /// Multiplicative penalty to apply to a candidate's quality score:
    /// `1.0` if unseen, reduced if the image or its author was seen
    /// within the window. Penalties for image and author do not stack
    /// beyond the stricter of the two.
    pub fn penalty_for(&self, image_id: i64, author_id: Option<i64>) -> f64 {
        let mut seen = self.seen.lock().unwrap();
        self.evict_expired(&mut seen);
        let mut penalty = 1.0_f64;
        for entry in seen.iter() {
            if entry.image_id == image_id {
                penalty = penalty.min(self.image_penalty);
            }
            if author_id.is_some() && entry.author_id == author_id {
                penalty = penalty.min(self.author_penalty);
            }
        }
        penalty
    }

    fn evict_expired(&self, seen: &mut VecDeque<Seen>) {
        let cutoff = Instant::now() - self.window;
        while matches!(seen.front(), Some(entry) if entry.at < cutoff) {
            seen.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_image_has_no_penalty() {
        let dedup = DedupWindow::new(60, 0.2, 0.5);
        assert_eq!(dedup.penalty_for(1, Some(10)), 1.0);
    }

    #[test]
    fn seen_image_is_penalized() {
        let dedup = DedupWindow::new(60, 0.2, 0.5);
        dedup.record(1, Some(10));
        assert_eq!(dedup.penalty_for(1, Some(99)), 0.2);
    }

    #[test]
    fn seen_author_is_penalized_for_other_images() {
        let dedup = DedupWindow::new(60, 0.2, 0.5);
        dedup.record(1, Some(10));
        assert_eq!(dedup.penalty_for(2, Some(10)), 0.5);
    }

    #[test]
    fn stricter_penalty_wins_when_both_match() {
        let dedup = DedupWindow::new(60, 0.2, 0.5);
        dedup.record(1, Some(10));
        assert_eq!(dedup.penalty_for(1, Some(10)), 0.2);
    }
}
