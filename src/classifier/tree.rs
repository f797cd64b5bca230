//! Histogram decision trees shared by the boosted and bagged ensembles.
//!
//! Training data is kept sparse: each row lists only its non-zero columns, and
//! every column is quantised into at most [`MAX_BINS`] bins. Histograms are
//! filled from the non-zero entries and the zero bin is recovered from the
//! node total, so split search costs O(non-zeros) per node.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::tfidf::SparseVec;

pub const MAX_BINS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Binary tree stored as an arena; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, x: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    index = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Same walk as [`Tree::predict`] for a row of the training set.
    pub fn predict_row(&self, data: &BinnedDataset, row: usize) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if data.goes_left(row, *feature, *threshold) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match &nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Training rows quantised per column.
pub struct BinnedDataset {
    n_features: usize,
    thresholds: Vec<Vec<f64>>,
    zero_bin: Vec<u8>,
    /// Per row: `(column, bin)` for the non-zero entries, sorted by column.
    row_bins: Vec<Vec<(usize, u8)>>,
    splittable: Vec<usize>,
}

impl BinnedDataset {
    pub fn new(rows: &[SparseVec], n_features: usize) -> Self {
        let n_rows = rows.len();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n_features];
        for row in rows {
            for &(col, value) in row {
                if col < n_features && value != 0.0 {
                    columns[col].push(value);
                }
            }
        }

        let thresholds: Vec<Vec<f64>> = columns
            .into_iter()
            .map(|mut values| {
                if values.len() < n_rows {
                    values.push(0.0);
                }
                column_thresholds(values)
            })
            .collect();

        let zero_bin = thresholds.iter().map(|t| bin_of(t, 0.0)).collect();
        let row_bins = rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(col, value)| *col < n_features && *value != 0.0)
                    .map(|&(col, value)| (col, bin_of(&thresholds[col], value)))
                    .collect()
            })
            .collect();
        let splittable = (0..n_features).filter(|f| !thresholds[*f].is_empty()).collect();

        Self {
            n_features,
            thresholds,
            zero_bin,
            row_bins,
            splittable,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_bins.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn splittable(&self) -> &[usize] {
        &self.splittable
    }

    /// Whether the row's value is `<= threshold`, for a threshold taken from
    /// this dataset's own bin edges.
    fn goes_left(&self, row: usize, feature: usize, threshold: f64) -> bool {
        self.bin(row, feature) <= bin_of(&self.thresholds[feature], threshold)
    }

    fn bin(&self, row: usize, feature: usize) -> u8 {
        let entries = &self.row_bins[row];
        match entries.binary_search_by_key(&feature, |(col, _)| *col) {
            Ok(i) => entries[i].1,
            Err(_) => self.zero_bin[feature],
        }
    }
}

fn column_thresholds(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    let midpoints: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    if midpoints.len() < MAX_BINS {
        return midpoints;
    }
    let step = midpoints.len() as f64 / (MAX_BINS - 1) as f64;
    let mut picked: Vec<f64> = (0..MAX_BINS - 1)
        .map(|i| midpoints[((i as f64 + 0.5) * step) as usize])
        .collect();
    picked.dedup();
    picked
}

fn bin_of(thresholds: &[f64], value: f64) -> u8 {
    thresholds.partition_point(|t| *t < value) as u8
}

/// Split quality and leaf values for one kind of tree.
pub trait SplitObjective {
    /// Length of the per-row statistics vector.
    fn dims(&self) -> usize;
    fn gain(&self, parent: &[f64], left: &[f64], right: &[f64]) -> f64;
    fn leaf_value(&self, stats: &[f64]) -> Vec<f64>;
    fn child_allowed(&self, stats: &[f64]) -> bool;
}

pub enum FeatureChoice<'a> {
    /// Same column subset for every node (boosting column sampling).
    Fixed(&'a [usize]),
    /// Fresh random subset of this size at every node (random forest).
    PerNode(usize),
}

pub struct GrowParams<'a> {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub features: FeatureChoice<'a>,
}

struct Builder<'a, O: SplitObjective, R: Rng> {
    data: &'a BinnedDataset,
    stats: &'a [f64],
    objective: &'a O,
    params: &'a GrowParams<'a>,
    rng: &'a mut R,
    nodes: Vec<Node>,
    slot: Vec<Option<usize>>,
}

struct BestSplit {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows one tree over `samples` (row indices, repeats allowed).
///
/// `stats` holds `objective.dims()` values per row, row-major.
pub fn grow_tree<O: SplitObjective, R: Rng>(
    data: &BinnedDataset,
    stats: &[f64],
    samples: Vec<usize>,
    objective: &O,
    params: &GrowParams,
    rng: &mut R,
) -> Tree {
    let mut builder = Builder {
        data,
        stats,
        objective,
        params,
        rng,
        nodes: Vec::new(),
        slot: vec![None; data.n_features()],
    };
    builder.build(samples, 0);
    Tree {
        nodes: builder.nodes,
    }
}

impl<'a, O: SplitObjective, R: Rng> Builder<'a, O, R> {
    fn totals(&self, samples: &[usize]) -> Vec<f64> {
        let dims = self.objective.dims();
        let mut total = vec![0.0; dims];
        for &i in samples {
            for (t, s) in total.iter_mut().zip(&self.stats[i * dims..(i + 1) * dims]) {
                *t += s;
            }
        }
        total
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let total = self.totals(&samples);
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.objective.leaf_value(&total),
        });

        if depth >= self.params.max_depth || samples.len() < self.params.min_samples_split {
            return index;
        }

        let Some(best) = self.best_split(&samples, &total) else {
            return index;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| (self.data.bin(i, best.feature) as usize) <= best.bin);
        if left.is_empty() || right.is_empty() {
            return index;
        }

        let threshold = self.data.thresholds[best.feature][best.bin];
        let left = self.build(left, depth + 1);
        let right = self.build(right, depth + 1);
        self.nodes[index] = Node::Split {
            feature: best.feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn candidates(&mut self) -> Vec<usize> {
        let params = self.params;
        let data = self.data;
        match &params.features {
            FeatureChoice::Fixed(features) => features.to_vec(),
            FeatureChoice::PerNode(k) => {
                let pool = data.splittable();
                let k = (*k).min(pool.len());
                pool.choose_multiple(&mut *self.rng, k).copied().collect()
            }
        }
    }

    fn best_split(&mut self, samples: &[usize], total: &[f64]) -> Option<BestSplit> {
        let candidates: Vec<usize> = self
            .candidates()
            .into_iter()
            .filter(|f| !self.data.thresholds[*f].is_empty())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let dims = self.objective.dims();
        for (s, &f) in candidates.iter().enumerate() {
            self.slot[f] = Some(s);
        }

        // hist[(slot * MAX_BINS + bin) * dims + d]
        let mut hist = vec![0.0; candidates.len() * MAX_BINS * dims];
        let mut nonzero = vec![0.0; candidates.len() * dims];
        for &i in samples {
            let row_stats = &self.stats[i * dims..(i + 1) * dims];
            for &(col, bin) in &self.data.row_bins[i] {
                let Some(s) = self.slot[col] else { continue };
                let base = (s * MAX_BINS + bin as usize) * dims;
                for d in 0..dims {
                    hist[base + d] += row_stats[d];
                    nonzero[s * dims + d] += row_stats[d];
                }
            }
        }

        let mut best: Option<BestSplit> = None;
        let mut left = vec![0.0; dims];
        let mut right = vec![0.0; dims];
        for (s, &f) in candidates.iter().enumerate() {
            let zero = self.data.zero_bin[f] as usize;
            let base = (s * MAX_BINS + zero) * dims;
            for d in 0..dims {
                hist[base + d] += total[d] - nonzero[s * dims + d];
            }

            left.iter_mut().for_each(|v| *v = 0.0);
            let n_thresholds = self.data.thresholds[f].len();
            for bin in 0..n_thresholds {
                let base = (s * MAX_BINS + bin) * dims;
                for d in 0..dims {
                    left[d] += hist[base + d];
                    right[d] = total[d] - left[d];
                }
                if !self.objective.child_allowed(&left) || !self.objective.child_allowed(&right) {
                    continue;
                }
                let gain = self.objective.gain(total, &left, &right);
                if gain > 1e-9 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { feature: f, bin, gain });
                }
            }
        }

        for &f in &candidates {
            self.slot[f] = None;
        }
        best
    }
}

/// Weighted gini decrease over one-hot class counts.
pub struct GiniObjective {
    pub n_classes: usize,
}

fn gini(counts: &[f64]) -> (f64, f64) {
    let n: f64 = counts.iter().sum();
    if n <= 0.0 {
        return (0.0, 0.0);
    }
    let impurity = 1.0 - counts.iter().map(|c| (c / n) * (c / n)).sum::<f64>();
    (n, impurity)
}

impl SplitObjective for GiniObjective {
    fn dims(&self) -> usize {
        self.n_classes
    }

    fn gain(&self, parent: &[f64], left: &[f64], right: &[f64]) -> f64 {
        let (np, gp) = gini(parent);
        let (nl, gl) = gini(left);
        let (nr, gr) = gini(right);
        np * gp - nl * gl - nr * gr
    }

    fn leaf_value(&self, stats: &[f64]) -> Vec<f64> {
        let n: f64 = stats.iter().sum();
        if n <= 0.0 {
            return vec![1.0 / self.n_classes as f64; self.n_classes];
        }
        stats.iter().map(|c| c / n).collect()
    }

    fn child_allowed(&self, stats: &[f64]) -> bool {
        stats.iter().sum::<f64>() >= 1.0
    }
}

/// Second-order softmax boosting objective with multi-output leaves.
///
/// Row stats are `[g_0..g_k, h_0..h_k]`.
pub struct GradientObjective {
    pub n_classes: usize,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub learning_rate: f64,
}

impl GradientObjective {
    fn score(&self, stats: &[f64]) -> f64 {
        let k = self.n_classes;
        (0..k)
            .map(|c| stats[c] * stats[c] / (stats[k + c] + self.lambda))
            .sum()
    }
}

impl SplitObjective for GradientObjective {
    fn dims(&self) -> usize {
        self.n_classes * 2
    }

    fn gain(&self, parent: &[f64], left: &[f64], right: &[f64]) -> f64 {
        0.5 * (self.score(left) + self.score(right) - self.score(parent))
    }

    fn leaf_value(&self, stats: &[f64]) -> Vec<f64> {
        let k = self.n_classes;
        (0..k)
            .map(|c| -self.learning_rate * stats[c] / (stats[k + c] + self.lambda))
            .collect()
    }

    fn child_allowed(&self, stats: &[f64]) -> bool {
        stats[self.n_classes..].iter().sum::<f64>() >= self.min_child_weight
    }
}
