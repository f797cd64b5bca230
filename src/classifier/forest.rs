use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{grow_tree, BinnedDataset, FeatureChoice, GiniObjective, GrowParams, Tree};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

/// Bagged gini trees with sqrt(d) candidate columns per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_classes: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn fit(data: &BinnedDataset, labels: &[usize], n_classes: usize, params: &ForestParams) -> Self {
        let n = data.n_rows();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut stats = vec![0.0; n * n_classes];
        for (i, &y) in labels.iter().enumerate() {
            stats[i * n_classes + y] = 1.0;
        }

        let per_node = (data.splittable().len() as f64).sqrt().ceil().max(1.0) as usize;
        let objective = GiniObjective { n_classes };
        let grow = GrowParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            features: FeatureChoice::PerNode(per_node),
        };

        let trees = (0..params.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = if n == 0 {
                    Vec::new()
                } else {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                };
                grow_tree(data, &stats, bootstrap, &objective, &grow, &mut rng)
            })
            .collect();

        Self { n_classes, trees }
    }

    /// Mean of the per-tree leaf class distributions.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        if self.trees.is_empty() {
            return vec![1.0 / self.n_classes as f64; self.n_classes];
        }
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.predict(x)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tfidf::SparseVec;

    #[test]
    fn test_forest_separates_classes() {
        let mut rows: Vec<SparseVec> = Vec::new();
        let mut labels = Vec::new();
        for i in 0..80 {
            let class = i % 2;
            let mut row = vec![(0, if class == 1 { 5.0 } else { 1.0 })];
            row.push((1 + i % 3, 1.0));
            rows.push(row);
            labels.push(class);
        }
        let data = BinnedDataset::new(&rows, 4);
        let params = ForestParams {
            n_trees: 25,
            max_depth: 4,
            seed: 11,
        };
        let forest = RandomForest::fit(&data, &labels, 2, &params);
        assert_eq!(forest.n_trees(), 25);

        let p1 = forest.predict_proba(&[5.0, 1.0, 0.0, 0.0]);
        let p0 = forest.predict_proba(&[1.0, 0.0, 1.0, 0.0]);
        assert!(p1[1] > 0.5);
        assert!(p0[0] > 0.5);
        assert!((p1.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let rows: Vec<SparseVec> = (0..30).map(|i| vec![(0, (i % 4) as f64 + 1.0), (1, (i % 3) as f64 + 1.0)]).collect();
        let labels: Vec<usize> = (0..30).map(|i| i % 2).collect();
        let data = BinnedDataset::new(&rows, 2);
        let params = ForestParams {
            n_trees: 5,
            max_depth: 3,
            seed: 9,
        };
        let a = RandomForest::fit(&data, &labels, 2, &params);
        let b = RandomForest::fit(&data, &labels, 2, &params);
        assert_eq!(a.predict_proba(&[2.0, 3.0]), b.predict_proba(&[2.0, 3.0]));
    }
}
