//! Feature orderings for permutation-based Shapley estimation
//!
//! Small feature spaces are enumerated exhaustively, which makes the estimate
//! the exact interventional Shapley value for each background row. Larger
//! spaces are sampled in antithetic pairs: an ordering followed by its
//! reverse, so every feature appears early and late equally often.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::borrow::Cow;

use rand::seq::SliceRandom;
use rand::Rng;

/// How orderings are produced for a given dimensionality and budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingPlan {
    /// Every permutation of the features, `d!` of them
    Exhaustive(Vec<Vec<usize>>),

    /// Fresh antithetic samples on every draw
    Sampled { n_features: usize, n_orderings: usize },
}

impl OrderingPlan {
    /// Enumerates exhaustively when `d!` does not exceed `budget`
    pub fn new(n_features: usize, budget: usize) -> Self {
        match factorial_within(n_features, budget) {
            Some(_) => OrderingPlan::Exhaustive(all_permutations(n_features)),
            None => OrderingPlan::Sampled {
                n_features,
                n_orderings: budget,
            },
        }
    }

    pub fn is_exhaustive(&self) -> bool {
        matches!(self, OrderingPlan::Exhaustive(_))
    }

    /// Number of orderings returned by each [`draw`](Self::draw)
    pub fn len(&self) -> usize {
        match self {
            OrderingPlan::Exhaustive(orderings) => orderings.len(),
            OrderingPlan::Sampled { n_orderings, .. } => *n_orderings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Orderings for one background row
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Cow<'_, [Vec<usize>]> {
        match self {
            OrderingPlan::Exhaustive(orderings) => Cow::Borrowed(orderings.as_slice()),
            OrderingPlan::Sampled { n_features, n_orderings } => {
                Cow::Owned(antithetic_orderings(*n_features, *n_orderings, rng))
            }
        }
    }
}

/// `n!` if it does not exceed `limit`
fn factorial_within(n: usize, limit: usize) -> Option<usize> {
    (1..=n).try_fold(1usize, |acc, k| acc.checked_mul(k).filter(|&value| value <= limit))
}

/// All permutations of `0..n` in lexicographic order
pub fn all_permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut permutations = vec![current.clone()];

    while next_permutation(&mut current) {
        permutations.push(current.clone());
    }

    permutations
}

/// Advances to the next lexicographic permutation; false once wrapped
fn next_permutation(values: &mut [usize]) -> bool {
    if values.len() < 2 {
        return false;
    }

    let Some(pivot) = (0..values.len() - 1).rev().find(|&i| values[i] < values[i + 1]) else {
        return false;
    };
    let successor = (pivot + 1..values.len())
        .rev()
        .find(|&j| values[j] > values[pivot])
        .unwrap_or(pivot + 1);

    values.swap(pivot, successor);
    values[pivot + 1..].reverse();
    true
}

/// `count` orderings as (shuffle, reversed shuffle) pairs
pub fn antithetic_orderings<R: Rng + ?Sized>(n_features: usize, count: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut orderings = Vec::with_capacity(count);

    while orderings.len() < count {
        let mut ordering: Vec<usize> = (0..n_features).collect();
        ordering.shuffle(rng);

        if orderings.len() + 1 < count {
            let mut reversed = ordering.clone();
            reversed.reverse();
            orderings.push(ordering);
            orderings.push(reversed);
        } else {
            orderings.push(ordering);
        }
    }

    orderings
}
