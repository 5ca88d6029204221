//! Random isolation tree
//!
//! An isolation tree recursively partitions a subsample with axis-aligned
//! splits at uniformly random thresholds until every point is isolated or the
//! depth limit is reached. Anomalies sit in sparse regions and are separated
//! after few splits, so their root-to-leaf path is short.
//!
//! # Mathematical Foundations
//!
//! ## Path Length
//! For a point `x` reaching a leaf at depth `e` that holds `m` training
//! points:
//! ```text
//! h(x) = e + c(m)
//! ```
//! where `c(m)` is the expected depth of an unsuccessful search in a binary
//! search tree of `m` keys:
//! ```text
//! c(m) = 2·H(m-1) - 2(m-1)/m    for m > 1
//! c(m) = 0                      for m ≤ 1
//! ```
//! and `H(k)` is the `k`-th harmonic number.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use rand::Rng;

use crate::data_structures::matrix::Matrix;

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Beyond this argument the asymptotic expansion of `H(k)` is used
const HARMONIC_EXACT_LIMIT: usize = 1024;

/// `k`-th harmonic number
pub fn harmonic_number(k: usize) -> f64 {
    if k <= HARMONIC_EXACT_LIMIT {
        (1..=k).map(|i| 1.0 / i as f64).sum()
    } else {
        let k = k as f64;
        k.ln() + EULER_GAMMA + 1.0 / (2.0 * k) - 1.0 / (12.0 * k * k)
    }
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let nf = n as f64;
    2.0 * harmonic_number(n - 1) - 2.0 * (nf - 1.0) / nf
}

/// Depth limit for a tree grown on `sample_size` points: `ceil(log2(ψ))`
pub fn max_depth_for(sample_size: usize) -> usize {
    if sample_size <= 1 {
        return 0;
    }
    (sample_size as f64).log2().ceil() as usize
}

/// Node of an isolation tree
#[derive(Debug, Clone, PartialEq)]
pub enum IsolationNode {
    /// Axis-aligned split; left receives `value < threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },

    /// Terminal node with the number of training points that reached it
    Leaf { size: usize, depth: usize },
}

impl IsolationNode {
    fn depth(&self) -> usize {
        match self {
            IsolationNode::Split { left, right, .. } => left.depth().max(right.depth()),
            IsolationNode::Leaf { depth, .. } => *depth,
        }
    }

    fn count(&self) -> (usize, usize) {
        match self {
            IsolationNode::Split { left, right, .. } => {
                let (left_nodes, left_leaves) = left.count();
                let (right_nodes, right_leaves) = right.count();
                (1 + left_nodes + right_nodes, left_leaves + right_leaves)
            }
            IsolationNode::Leaf { .. } => (1, 1),
        }
    }
}

/// Isolation tree grown from a subsample
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationTree {
    root: IsolationNode,
    max_depth: usize,
    sample_size: usize,
}

impl IsolationTree {
    /// Grows a tree over every row of `subsample`
    pub fn build<R: Rng + ?Sized>(subsample: &Matrix, max_depth: usize, rng: &mut R) -> Self {
        let indices: Vec<usize> = (0..subsample.n_rows()).collect();
        let root = Self::grow(subsample, indices, 0, max_depth, rng);

        Self {
            root,
            max_depth,
            sample_size: subsample.n_rows(),
        }
    }

    fn grow<R: Rng + ?Sized>(
        data: &Matrix,
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> IsolationNode {
        if indices.len() <= 1 || depth >= max_depth {
            return IsolationNode::Leaf { size: indices.len(), depth };
        }

        let Some((feature, threshold)) = Self::choose_split(data, &indices, rng) else {
            return IsolationNode::Leaf { size: indices.len(), depth };
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&row| data.get(row, feature) < threshold);

        IsolationNode::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(data, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(data, right, depth + 1, max_depth, rng)),
        }
    }

    /// Picks a feature uniformly among those not yet tried until one admits a
    /// threshold strictly inside its range
    fn choose_split<R: Rng + ?Sized>(data: &Matrix, indices: &[usize], rng: &mut R) -> Option<(usize, f64)> {
        let mut candidates: Vec<usize> = (0..data.n_cols()).collect();

        while !candidates.is_empty() {
            let feature = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            let Some((min, max)) = data.column_range(feature, indices) else {
                continue;
            };
            if min < max {
                if let Some(threshold) = draw_threshold(min, max, rng) {
                    return Some((feature, threshold));
                }
            }
        }

        None
    }

    /// Path length of `point`, including the leaf-size correction `c(size)`
    pub fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut hops = 0usize;

        loop {
            match node {
                IsolationNode::Split { feature, threshold, left, right } => {
                    node = if point[*feature] < *threshold { left } else { right };
                    hops += 1;
                }
                IsolationNode::Leaf { size, .. } => {
                    return hops as f64 + average_path_length(*size);
                }
            }
        }
    }

    pub fn root(&self) -> &IsolationNode {
        &self.root
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.root.count().0
    }

    pub fn leaf_count(&self) -> usize {
        self.root.count().1
    }
}

/// Uniform draw from the open interval `(min, max)`
///
/// Interpolates between the bounds instead of using `max - min`, which
/// overflows for finite bounds of opposite sign near `f64::MAX`. Returns
/// `None` when no representable value lies strictly inside, i.e. the bounds
/// are adjacent floats.
fn draw_threshold<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> Option<f64> {
    let u: f64 = rng.gen();
    let threshold = min * (1.0 - u) + max * u;
    if threshold > min && threshold < max {
        return Some(threshold);
    }

    let midpoint = min * 0.5 + max * 0.5;
    (midpoint > min && midpoint < max).then_some(midpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn matrix(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    fn for_each_split(node: &IsolationNode, visit: &mut dyn FnMut(usize, f64, &IsolationNode, &IsolationNode)) {
        if let IsolationNode::Split { feature, threshold, left, right } = node {
            visit(*feature, *threshold, left, right);
            for_each_split(left, visit);
            for_each_split(right, visit);
        }
    }

    fn leaf_sizes(node: &IsolationNode, out: &mut Vec<usize>) {
        match node {
            IsolationNode::Split { left, right, .. } => {
                leaf_sizes(left, out);
                leaf_sizes(right, out);
            }
            IsolationNode::Leaf { size, .. } => out.push(*size),
        }
    }

    #[test]
    fn test_average_path_length_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_relative_eq!(average_path_length(2), 1.0);
        // 2·H(3) - 2·3/4 = 2·(11/6) - 1.5
        assert_relative_eq!(average_path_length(4), 11.0 / 3.0 - 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_harmonic_asymptotic_matches_exact() {
        let exact: f64 = (1..=2000).map(|i| 1.0 / i as f64).sum();
        assert_relative_eq!(harmonic_number(2000), exact, max_relative = 1e-12);
    }

    #[test]
    fn test_max_depth() {
        assert_eq!(max_depth_for(1), 0);
        assert_eq!(max_depth_for(2), 1);
        assert_eq!(max_depth_for(5), 3);
        assert_eq!(max_depth_for(256), 8);
        assert_eq!(max_depth_for(257), 9);
    }

    #[test]
    fn test_single_point_is_leaf() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = IsolationTree::build(&matrix(vec![vec![3.0, 4.0]]), 4, &mut rng);
        assert_eq!(tree.root(), &IsolationNode::Leaf { size: 1, depth: 0 });
        assert_eq!(tree.path_length(&[100.0, -5.0]), 0.0);
    }

    #[test]
    fn test_constant_sample_is_leaf() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let data = matrix(vec![vec![1.0, 2.0]; 6]);
        let tree = IsolationTree::build(&data, 3, &mut rng);
        assert_eq!(tree.root(), &IsolationNode::Leaf { size: 6, depth: 0 });
        assert_relative_eq!(tree.path_length(&[1.0, 2.0]), average_path_length(6));
    }

    #[test]
    fn test_constant_feature_is_skipped() {
        // Feature 0 is constant, so every split must use feature 1
        let data = matrix((0..16).map(|i| vec![7.0, i as f64]).collect());
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tree = IsolationTree::build(&data, 4, &mut rng);
            assert!(matches!(tree.root(), IsolationNode::Split { .. }));
            for_each_split(tree.root(), &mut |feature, _, _, _| assert_eq!(feature, 1));
        }
    }

    #[test]
    fn test_thresholds_strictly_inside_range() {
        let data = matrix((0..32).map(|i| vec![(i % 7) as f64, (i * i % 11) as f64 * 0.5]).collect());
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tree = IsolationTree::build(&data, 10, &mut rng);

        // Every split sends at least one training point each way, which holds
        // only if min < threshold <= max on the node's sample
        let mut checked = 0;
        for_each_split(tree.root(), &mut |_, threshold, left, right| {
            assert!(threshold.is_finite());
            let (mut l, mut r) = (Vec::new(), Vec::new());
            leaf_sizes(left, &mut l);
            leaf_sizes(right, &mut r);
            assert!(l.iter().sum::<usize>() > 0);
            assert!(r.iter().sum::<usize>() > 0);
            checked += 1;
        });
        assert!(checked > 0);
    }

    #[test]
    fn test_leaf_sizes_partition_sample() {
        let data = matrix((0..20).map(|i| vec![i as f64, (20 - i) as f64]).collect());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tree = IsolationTree::build(&data, max_depth_for(20), &mut rng);

        let mut sizes = Vec::new();
        leaf_sizes(tree.root(), &mut sizes);
        assert_eq!(sizes.iter().sum::<usize>(), 20);
        assert_eq!(sizes.len(), tree.leaf_count());
        assert_eq!(tree.node_count(), 2 * tree.leaf_count() - 1);
        assert!(tree.depth() <= tree.max_depth());
    }

    #[test]
    fn test_depth_limit_respected() {
        let data = matrix((0..64).map(|i| vec![i as f64]).collect());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let tree = IsolationTree::build(&data, 2, &mut rng);
        assert!(tree.depth() <= 2);
        assert_eq!(tree.sample_size(), 64);
    }

    #[test]
    fn test_outlier_isolated_at_root() {
        // Any threshold in (0, 10) separates the outlier on the first split
        let data = matrix(vec![vec![0.0], vec![0.0], vec![0.0], vec![0.0], vec![10.0]]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let tree = IsolationTree::build(&data, max_depth_for(5), &mut rng);

        assert_relative_eq!(tree.path_length(&[10.0]), 1.0);
        assert_relative_eq!(tree.path_length(&[0.0]), 1.0 + average_path_length(4));
    }

    #[test]
    fn test_build_is_deterministic() {
        let data = matrix((0..40).map(|i| vec![(i * 3 % 17) as f64, (i % 5) as f64]).collect());
        let a = IsolationTree::build(&data, 6, &mut ChaCha8Rng::seed_from_u64(21));
        let b = IsolationTree::build(&data, 6, &mut ChaCha8Rng::seed_from_u64(21));
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_threshold_adjacent_floats() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let min = 1.0_f64;
        let max = f64::from_bits(min.to_bits() + 1);
        assert_eq!(draw_threshold(min, max, &mut rng), None);

        let t = draw_threshold(0.0, 1.0, &mut rng).unwrap();
        assert!(t > 0.0 && t < 1.0);
    }

    #[test]
    fn test_draw_threshold_extreme_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for (min, max) in [(-1e308, 1e308), (-f64::MAX, f64::MAX), (1e308, f64::MAX), (-f64::MAX, 0.0)] {
            for _ in 0..100 {
                let t = draw_threshold(min, max, &mut rng).unwrap();
                assert!(t.is_finite() && t > min && t < max, "{} not in ({}, {})", t, min, max);
            }
        }
    }

    #[test]
    fn test_build_on_extreme_values() {
        let data = matrix(vec![vec![-1e308], vec![1e308], vec![0.0], vec![f64::MAX]]);
        let tree = IsolationTree::build(&data, 3, &mut ChaCha8Rng::seed_from_u64(8));

        assert_eq!(tree.node_count(), 2 * tree.leaf_count() - 1);
        for_each_split(tree.root(), &mut |_, threshold, _, _| {
            assert!(threshold.is_finite() && threshold > -1e308 && threshold < f64::MAX);
        });
        assert!(tree.path_length(&[1e308]).is_finite());
    }
}
