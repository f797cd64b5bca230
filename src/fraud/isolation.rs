//! Isolation forest over standardized transaction features.
//!
//! Trees split on random hyperplanes rather than single axes, so every split
//! sees every feature. A scored point that falls outside a node's projected
//! range is isolated there with probability equal to its share of the
//! widened range, which makes scoring deterministic for a fitted forest.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const MAX_STANDARD: f64 = 1e6;
const SPLIT_ATTEMPTS: usize = 8;

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = (n - 1) as f64;
            2.0 * (m.ln() + EULER_GAMMA) - 2.0 * m / n as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IsolationParams {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
        /// Set when the leaf holds copies of one point that no split can separate.
        point: Option<Vec<f64>>,
    },
    Split {
        normal: Vec<f64>,
        lo: f64,
        hi: f64,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(points: &[Vec<f64>], indices: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(points, indices, 0, height_limit, rng);
        tree
    }

    fn build(
        &mut self,
        points: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
            point: None,
        });
        if indices.len() <= 1 || depth >= height_limit {
            return id;
        }

        let dims = points[indices[0]].len();
        for _ in 0..SPLIT_ATTEMPTS {
            let normal: Vec<f64> = (0..dims).map(|_| rng.gen_range(-1.0..=1.0)).collect();
            let projected: Vec<f64> = indices.iter().map(|&i| dot(&normal, &points[i])).collect();
            let lo = projected.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = projected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if hi - lo <= 1e-12 {
                continue;
            }

            let threshold = rng.gen_range(lo..hi);
            let mut left = Vec::new();
            let mut right = Vec::new();
            for (&i, &p) in indices.iter().zip(&projected) {
                if p <= threshold {
                    left.push(i);
                } else {
                    right.push(i);
                }
            }
            let left_id = self.build(points, left, depth + 1, height_limit, rng);
            let right_id = self.build(points, right, depth + 1, height_limit, rng);
            self.nodes[id] = Node::Split {
                normal,
                lo,
                hi,
                threshold,
                left: left_id,
                right: right_id,
            };
            return id;
        }
        self.nodes[id] = Node::Leaf {
            size: indices.len(),
            point: Some(points[indices[0]].clone()),
        };
        id
    }

    fn expected_path(&self, x: &[f64]) -> f64 {
        self.path_from(0, x, 0)
    }

    fn path_from(&self, id: usize, x: &[f64], depth: usize) -> f64 {
        match &self.nodes[id] {
            Node::Leaf { size, point } => match point {
                Some(point) if !same_point(point, x) => (depth + 1) as f64,
                _ => depth as f64 + average_path_length(*size),
            },
            Node::Split {
                normal,
                lo,
                hi,
                threshold,
                left,
                right,
            } => {
                let p = dot(normal, x);
                let (outside, child) = if p < *lo {
                    ((lo - p) / (hi - p), *left)
                } else if p > *hi {
                    ((p - hi) / (p - lo), *right)
                } else if p <= *threshold {
                    (0.0, *left)
                } else {
                    (0.0, *right)
                };
                let rest = self.path_from(child, x, depth + 1);
                outside * (depth + 1) as f64 + (1.0 - outside) * rest
            }
        }
    }
}

fn same_point(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-9)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Per-column standardization fitted on the training history.
#[derive(Debug, Clone)]
struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len().max(1) as f64;
        let mean: Vec<f64> = (0..dims).map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n).collect();
        let scale = (0..dims)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > 1e-9 {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Self { mean, scale }
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| ((v - m) / s).clamp(-MAX_STANDARD, MAX_STANDARD))
            .collect()
    }
}

/// Fitted forest. Scoring takes `&self` and is safe to share across readers.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    scaler: Scaler,
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    pub fn fit(rows: &[Vec<f64>], params: &IsolationParams) -> Self {
        let scaler = Scaler::fit(rows);
        let points: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();
        let sample_size = params.sample_size.min(points.len());
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = if sample_size == 0 {
            Vec::new()
        } else {
            (0..params.n_trees)
                .map(|_| {
                    let indices = sample(&mut rng, points.len(), sample_size).into_vec();
                    IsolationTree::grow(&points, indices, height_limit, &mut rng)
                })
                .collect()
        };

        Self {
            scaler,
            trees,
            sample_size,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Anomaly score in [0, 1]; values near 1 isolate quickly.
    pub fn score(&self, row: &[f64]) -> f64 {
        let norm = average_path_length(self.sample_size);
        if self.trees.is_empty() || norm <= 0.0 {
            return 0.0;
        }
        let x = self.scaler.transform(row);
        let mean_path = self.trees.iter().map(|t| t.expected_path(&x)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / norm).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IsolationParams {
        IsolationParams {
            n_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }

    fn cluster(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| vec![1000.0 + (i % 7) as f64 * 40.0, 10.0 + (i % 5) as f64, (i % 3) as f64])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.24).abs() < 0.05);
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let forest = IsolationForest::fit(&cluster(40), &params());
        assert_eq!(forest.n_trees(), 100);
        let inlier = forest.score(&[1080.0, 12.0, 1.0]);
        let outlier = forest.score(&[50_000.0, 12.0, 1.0]);
        assert!(outlier > 0.7, "outlier score {}", outlier);
        assert!(inlier < outlier);
        assert!(inlier < 0.7, "inlier score {}", inlier);
    }

    #[test]
    fn test_scores_in_unit_range() {
        let forest = IsolationForest::fit(&cluster(25), &params());
        for row in [[0.0, 0.0, 0.0], [1e12, -1e12, 5.0], [1000.0, 10.0, 0.0]] {
            let s = forest.score(&row);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_constant_history() {
        let rows = vec![vec![500.0, 9.0]; 30];
        let forest = IsolationForest::fit(&rows, &params());
        assert!((forest.score(&[500.0, 9.0]) - 0.5).abs() < 1e-9);
        assert!(forest.score(&[25_000.0, 9.0]) > 0.7);
    }

    #[test]
    fn test_empty_history_scores_zero() {
        let forest = IsolationForest::fit(&[], &params());
        assert_eq!(forest.score(&[1.0]), 0.0);
    }
}
