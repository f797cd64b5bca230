use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{grow_tree, BinnedDataset, FeatureChoice, GradientObjective, GrowParams, Tree};

#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub column_sample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

/// Softmax gradient-boosted trees, one multi-output tree per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_classes: usize,
    base_score: Vec<f64>,
    trees: Vec<Tree>,
}

pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

impl GradientBoosting {
    pub fn fit(data: &BinnedDataset, labels: &[usize], n_classes: usize, params: &BoostingParams) -> Self {
        let n = data.n_rows();
        let mut rng = StdRng::seed_from_u64(params.seed);

        // Start from smoothed log class priors.
        let mut counts = vec![1.0; n_classes];
        for &y in labels {
            counts[y] += 1.0;
        }
        let total: f64 = counts.iter().sum();
        let base_score: Vec<f64> = counts.iter().map(|c| (c / total).ln()).collect();

        let mut scores: Vec<f64> = base_score.iter().copied().cycle().take(n * n_classes).collect();
        let objective = GradientObjective {
            n_classes,
            lambda: params.lambda,
            min_child_weight: params.min_child_weight,
            learning_rate: params.learning_rate,
        };

        let pool = data.splittable().to_vec();
        let n_columns = ((pool.len() as f64 * params.column_sample).ceil() as usize).clamp(1, pool.len().max(1));
        let mut stats = vec![0.0; n * n_classes * 2];
        let mut trees = Vec::with_capacity(params.rounds);

        for round in 0..params.rounds {
            for i in 0..n {
                let p = softmax(&scores[i * n_classes..(i + 1) * n_classes]);
                let row = &mut stats[i * n_classes * 2..(i + 1) * n_classes * 2];
                for k in 0..n_classes {
                    let y = if labels[i] == k { 1.0 } else { 0.0 };
                    row[k] = p[k] - y;
                    row[n_classes + k] = (p[k] * (1.0 - p[k])).max(1e-6);
                }
            }

            let columns: Vec<usize> = pool.choose_multiple(&mut rng, n_columns).copied().collect();
            let grow = GrowParams {
                max_depth: params.max_depth,
                min_samples_split: 2,
                features: FeatureChoice::Fixed(&columns),
            };
            let tree = grow_tree(data, &stats, (0..n).collect(), &objective, &grow, &mut rng);

            for i in 0..n {
                let step = tree.predict_row(data, i);
                for k in 0..n_classes {
                    scores[i * n_classes + k] += step[k];
                }
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                tracing::debug!(round = round + 1, "Boosting progress");
            }
        }

        Self {
            n_classes,
            base_score,
            trees,
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut scores = self.base_score.clone();
        for tree in &self.trees {
            for (s, step) in scores.iter_mut().zip(tree.predict(x)) {
                *s += step;
            }
        }
        softmax(&scores)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}
