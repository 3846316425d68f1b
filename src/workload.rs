//! Decides whether each planned request is a GET or a POST.

use crate::model::{WorkItem, WorkKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Owns the run's random source; the same seed and ratio always produce the
/// same sequence of kinds.
#[derive(Debug)]
pub struct WorkloadGenerator {
    rng: StdRng,
    seed: u64,
    post_ratio: f64,
    next_index: usize,
}

impl WorkloadGenerator {
    /// `post_ratio` is clamped into `[0, 1]`; a non-finite ratio means all
    /// GET. Without a seed one is drawn from the OS so it can still be
    /// logged and replayed.
    pub fn new(post_ratio: f64, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            post_ratio: if post_ratio.is_finite() {
                post_ratio.clamp(0.0, 1.0)
            } else {
                0.0
            },
            next_index: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn post_ratio(&self) -> f64 {
        self.post_ratio
    }

    /// Unshuffled batch: `round(n * r)` POSTs followed by GETs.
    pub fn composition(&self, n: usize) -> Vec<WorkKind> {
        let posts = ((n as f64) * self.post_ratio).round() as usize;
        let posts = posts.min(n);
        let mut kinds = vec![WorkKind::Post; posts];
        kinds.resize(n, WorkKind::Get);
        kinds
    }

    /// Exact-ratio batch of `n` items in uniformly shuffled order.
    pub fn batch(&mut self, n: usize) -> Vec<WorkItem> {
        let mut kinds = self.composition(n);
        kinds.shuffle(&mut self.rng);
        kinds.into_iter().map(|kind| self.item(kind)).collect()
    }

    /// One item drawn independently, POST with probability `r`.
    pub fn sample(&mut self) -> WorkItem {
        let kind = if self.rng.random_bool(self.post_ratio) {
            WorkKind::Post
        } else {
            WorkKind::Get
        };
        self.item(kind)
    }

    fn item(&mut self, kind: WorkKind) -> WorkItem {
        let item = WorkItem::new(kind, self.next_index);
        self.next_index += 1;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(items: &[WorkItem]) -> Vec<WorkKind> {
        items.iter().map(|i| i.kind).collect()
    }

    fn count_posts(items: &[WorkItem]) -> usize {
        items.iter().filter(|i| i.kind == WorkKind::Post).count()
    }

    #[test]
    fn composition_matches_rounded_ratio() {
        for (n, r, posts) in [(10, 0.7, 7), (10, 0.25, 3), (3, 0.5, 2), (7, 0.0, 0), (7, 1.0, 7)] {
            let generator = WorkloadGenerator::new(r, Some(1));
            let composition = generator.composition(n);
            assert_eq!(composition.len(), n);
            let got = composition.iter().filter(|k| **k == WorkKind::Post).count();
            assert_eq!(got, posts, "n={n} r={r}");
        }
    }

    #[test]
    fn shuffle_preserves_composition() {
        let mut generator = WorkloadGenerator::new(0.6, Some(42));
        for _ in 0..20 {
            let batch = generator.batch(25);
            assert_eq!(batch.len(), 25);
            assert_eq!(count_posts(&batch), 15);
        }
    }

    #[test]
    fn shuffle_changes_order() {
        let mut generator = WorkloadGenerator::new(0.5, Some(7));
        let identity = generator.composition(16);
        // A single identity permutation is possible; twenty in a row is not.
        let shuffled = (0..20).any(|_| kinds(&generator.batch(16)) != identity);
        assert!(shuffled);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = WorkloadGenerator::new(0.3, Some(99));
        let mut b = WorkloadGenerator::new(0.3, Some(99));
        assert_eq!(kinds(&a.batch(50)), kinds(&b.batch(50)));
        let sa: Vec<_> = (0..50).map(|_| a.sample().kind).collect();
        let sb: Vec<_> = (0..50).map(|_| b.sample().kind).collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn edge_batches() {
        let mut generator = WorkloadGenerator::new(0.5, Some(3));
        assert!(generator.batch(0).is_empty());

        let mut all_get = WorkloadGenerator::new(0.0, Some(3));
        assert!(all_get.batch(12).iter().all(|i| i.kind == WorkKind::Get));
        assert!((0..100).all(|_| all_get.sample().kind == WorkKind::Get));

        let mut all_post = WorkloadGenerator::new(1.0, Some(3));
        assert!(all_post.batch(12).iter().all(|i| i.kind == WorkKind::Post));
        assert!((0..100).all(|_| all_post.sample().kind == WorkKind::Post));
    }

    #[test]
    fn non_finite_ratio_means_all_get() {
        for ratio in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut generator = WorkloadGenerator::new(ratio, Some(4));
            assert_eq!(generator.post_ratio(), 0.0);
            assert_eq!(generator.sample().kind, WorkKind::Get);
            assert!(generator.batch(8).iter().all(|i| i.kind == WorkKind::Get));
        }
        assert_eq!(WorkloadGenerator::new(3.0, Some(4)).post_ratio(), 1.0);
    }

    #[test]
    fn sequence_indices_are_contiguous() {
        let mut generator = WorkloadGenerator::new(0.5, Some(5));
        let mut items = generator.batch(10);
        items.push(generator.sample());
        items.extend(generator.batch(4));
        let indices: Vec<_> = items.iter().map(|i| i.sequence_index).collect();
        assert_eq!(indices, (0..15).collect::<Vec<_>>());
    }
}
