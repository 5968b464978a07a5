//! Streaming top-k selection over a score array.
//!
//! Keeps a bounded max-heap whose top is the worst candidate kept so far,
//! giving O(N log K) time and O(K) space. Ranking is by score descending,
//! ties broken by the lower row index. NaN scores rank below every number.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    score: f32,
}

impl Candidate {
    fn rank_key(&self) -> f32 {
        if self.score.is_nan() {
            f32::NEG_INFINITY
        } else {
            // Folds -0.0 into 0.0 so they tie
            self.score + 0.0
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Greater means worse: lower score, then higher row.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank_key()
            .total_cmp(&self.rank_key())
            .then_with(|| self.row.cmp(&other.row))
    }
}

/// Best `min(k, scores.len())` rows as `(row, score)`, best first.
#[must_use]
pub fn select_top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
    for (row, &score) in scores.iter().enumerate() {
        let candidate = Candidate { row, score };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|c| (c.row, c.score))
        .collect()
}
