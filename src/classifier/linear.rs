use serde::{Deserialize, Serialize};

use super::boosting::softmax;
use super::tfidf::SparseVec;

#[derive(Debug, Clone, Copy)]
pub struct LinearParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

/// Multinomial logistic regression over sparse tf-idf rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_classes: usize,
    dim: usize,
    /// Class-major: `weights[k * dim + j]`.
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl LogisticRegression {
    pub fn fit(rows: &[SparseVec], labels: &[usize], n_classes: usize, dim: usize, params: &LinearParams) -> Self {
        let mut model = Self {
            n_classes,
            dim,
            weights: vec![0.0; n_classes * dim],
            bias: vec![0.0; n_classes],
        };
        if rows.is_empty() {
            return model;
        }

        let n = rows.len() as f64;
        let mut grad_w = vec![0.0; n_classes * dim];
        let mut grad_b = vec![0.0; n_classes];

        for _ in 0..params.epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_b.iter_mut().for_each(|g| *g = 0.0);

            for (row, &y) in rows.iter().zip(labels) {
                let p = model.predict_proba(row);
                for k in 0..n_classes {
                    let diff = p[k] - if y == k { 1.0 } else { 0.0 };
                    grad_b[k] += diff;
                    for &(j, x) in row {
                        if j < dim {
                            grad_w[k * dim + j] += diff * x;
                        }
                    }
                }
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            for (b, g) in model.bias.iter_mut().zip(&grad_b) {
                *b -= params.learning_rate * g / n;
            }
        }
        model
    }

    pub fn predict_proba(&self, row: &[(usize, f64)]) -> Vec<f64> {
        let logits: Vec<f64> = (0..self.n_classes)
            .map(|k| {
                let w = &self.weights[k * self.dim..(k + 1) * self.dim];
                self.bias[k]
                    + row
                        .iter()
                        .filter(|(j, _)| *j < self.dim)
                        .map(|(j, x)| w[*j] * x)
                        .sum::<f64>()
            })
            .collect();
        softmax(&logits)
    }
}
