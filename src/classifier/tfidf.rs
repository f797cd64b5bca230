use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Sparse vector as `(column, value)` pairs sorted by column.
pub type SparseVec = Vec<(usize, f64)>;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("invalid token regex"))
}

/// Unigrams and bigrams of lowercase word tokens.
pub fn terms(doc: &str) -> Vec<String> {
    let lower = doc.to_lowercase();
    let tokens: Vec<&str> = token_re().find_iter(&lower).map(|m| m.as_str()).collect();
    let mut out: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    out.extend(tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    out
}

#[derive(Debug, Clone, Copy)]
pub struct TfidfParams {
    pub max_features: usize,
    pub min_df: usize,
    pub max_df: f64,
}

/// Vocabulary and idf weights, frozen at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(docs: &[S], params: TfidfParams) -> Self {
        let n_docs = docs.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in docs {
            let doc_terms = terms(doc.as_ref());
            let unique: HashSet<&String> = doc_terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            for term in doc_terms {
                *term_freq.entry(term).or_default() += 1;
            }
        }

        let max_df_count = (params.max_df * n_docs as f64).floor() as usize;
        let mut candidates: Vec<(&String, usize)> = doc_freq
            .iter()
            .filter(|(_, df)| **df >= params.min_df && **df <= max_df_count.max(1))
            .map(|(term, _)| (term, term_freq.get(term).copied().unwrap_or(0)))
            .collect();
        // Most frequent terms first, ties broken alphabetically for reproducibility.
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(params.max_features);

        let selected: BTreeMap<&String, usize> = candidates
            .into_iter()
            .map(|(term, _)| (term, doc_freq[term]))
            .collect();

        let mut vocabulary = HashMap::with_capacity(selected.len());
        let mut idf = Vec::with_capacity(selected.len());
        for (index, (term, df)) in selected.into_iter().enumerate() {
            vocabulary.insert(term.clone(), index);
            idf.push(((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// Sublinear tf-idf weights, L2-normalised.
    pub fn transform(&self, doc: &str) -> SparseVec {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for term in terms(doc) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_default() += 1;
            }
        }

        let mut weights: SparseVec = counts
            .into_iter()
            .map(|(index, tf)| (index, (1.0 + (tf as f64).ln()) * self.idf[index]))
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights
    }
}
