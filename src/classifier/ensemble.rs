use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::ClassifierConfig;
use crate::sms::{Feature, FeatureVector, Label, LabelResult, Method, FEATURE_COUNT};

use super::boosting::{BoostingParams, GradientBoosting};
use super::forest::{ForestParams, RandomForest};
use super::linear::{LinearParams, LogisticRegression};
use super::tfidf::{SparseVec, TfidfParams, TfidfVectorizer};
use super::tree::BinnedDataset;

/// One cleaned message with its known label.
#[derive(Debug, Clone)]
pub struct LabeledExample {
    pub text: String,
    pub features: FeatureVector,
    pub label: Label,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub f1_score: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

/// Immutable trained ensemble. Inference never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: ModelMetrics,
    /// Engineered feature columns the model was trained on, in order.
    #[serde(default)]
    feature_names: Vec<String>,
    vectorizer: TfidfVectorizer,
    boosting: GradientBoosting,
    forest: RandomForest,
    linear: LogisticRegression,
}

fn feature_layout() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.as_str().to_string()).collect()
}

/// Hand-crafted features first, tf-idf columns after them.
fn combined_row(features: &FeatureVector, tfidf: &SparseVec) -> SparseVec {
    let mut row: SparseVec = features
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, v)| (i, *v))
        .collect();
    row.extend(tfidf.iter().map(|(j, v)| (FEATURE_COUNT + j, *v)));
    row
}

impl ModelSnapshot {
    pub fn train(examples: &[LabeledExample], config: &ClassifierConfig) -> eyre::Result<Self> {
        if examples.is_empty() {
            return Err(eyre::eyre!("Cannot train a model on an empty corpus"));
        }
        let n_classes = Label::ALL.len();

        let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(
            &texts,
            TfidfParams {
                max_features: config.tfidf_max_features,
                min_df: config.tfidf_min_df,
                max_df: config.tfidf_max_df,
            },
        );
        let tfidf_rows: Vec<SparseVec> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let combined: Vec<SparseVec> = examples
            .iter()
            .zip(&tfidf_rows)
            .map(|(e, t)| combined_row(&e.features, t))
            .collect();
        let labels: Vec<usize> = examples.iter().map(|e| e.label.index()).collect();

        let data = BinnedDataset::new(&combined, FEATURE_COUNT + vectorizer.len());
        tracing::info!(
            samples = examples.len(),
            vocabulary = vectorizer.len(),
            "Training classifier ensemble"
        );

        let boosting = GradientBoosting::fit(
            &data,
            &labels,
            n_classes,
            &BoostingParams {
                rounds: config.gbt_rounds,
                max_depth: config.gbt_depth,
                learning_rate: config.gbt_learning_rate,
                column_sample: config.gbt_column_sample,
                lambda: 1.0,
                min_child_weight: 0.5,
                seed: config.seed,
            },
        );
        let forest = RandomForest::fit(
            &data,
            &labels,
            n_classes,
            &ForestParams {
                n_trees: config.forest_trees,
                max_depth: config.forest_depth,
                seed: config.seed.wrapping_add(1),
            },
        );
        let linear = LogisticRegression::fit(
            &tfidf_rows,
            &labels,
            n_classes,
            vectorizer.len(),
            &LinearParams {
                epochs: config.linear_epochs,
                learning_rate: config.linear_learning_rate,
                l2: 1e-4,
            },
        );

        Ok(Self {
            version: 0,
            trained_at: Utc::now(),
            metrics: ModelMetrics::default(),
            feature_names: feature_layout(),
            vectorizer,
            boosting,
            forest,
            linear,
        })
    }

    /// Soft-voted class probabilities in [`Label::ALL`] order.
    pub fn predict_proba(&self, text: &str, features: &FeatureVector) -> Vec<f64> {
        let tfidf = self.vectorizer.transform(text);
        let mut dense = vec![0.0; FEATURE_COUNT + self.vectorizer.len()];
        for (i, v) in combined_row(features, &tfidf) {
            dense[i] = v;
        }

        let members = [
            self.boosting.predict_proba(&dense),
            self.forest.predict_proba(&dense),
            self.linear.predict_proba(&tfidf),
        ];
        let mut proba = vec![0.0; Label::ALL.len()];
        for member in &members {
            for (p, m) in proba.iter_mut().zip(member) {
                *p += m / members.len() as f64;
            }
        }
        proba
    }

    pub fn predict(&self, text: &str, features: &FeatureVector) -> LabelResult {
        let proba = self.predict_proba(text, features);
        let (index, confidence) = proba
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        let label = Label::from_index(index).unwrap_or(Label::Personal);
        LabelResult::new(label, label.default_sub_label(), confidence, Method::MlEnsemble)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.len()
    }

    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| eyre::eyre!("Failed to create model directory '{}': {}", parent.display(), e))?;
        }
        let file = File::create(path)
            .map_err(|e| eyre::eyre!("Failed to create model file '{}': {}", path.display(), e))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| eyre::eyre!("Failed to write model file '{}': {}", path.display(), e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let file = File::open(path)
            .map_err(|e| eyre::eyre!("Failed to open model file '{}': {}", path.display(), e))?;
        let snapshot: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| eyre::eyre!("Failed to parse model file '{}': {}", path.display(), e))?;
        if snapshot.feature_names != feature_layout() {
            return Err(eyre::eyre!(
                "Model file '{}' was trained on a different feature layout ({} columns, expected {})",
                path.display(),
                snapshot.feature_names.len(),
                FEATURE_COUNT
            ));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sms::preprocess::{clean_text, extract_features};

    pub(crate) fn small_config() -> ClassifierConfig {
        ClassifierConfig {
            tfidf_min_df: 1,
            gbt_rounds: 20,
            gbt_depth: 3,
            gbt_learning_rate: 0.3,
            forest_trees: 10,
            forest_depth: 5,
            linear_epochs: 60,
            ..ClassifierConfig::default()
        }
    }

    pub(crate) fn example(body: &str, sender: &str, label: Label) -> LabeledExample {
        LabeledExample {
            text: clean_text(body),
            features: extract_features(body, sender),
            label,
        }
    }

    pub(crate) fn corpus() -> Vec<LabeledExample> {
        let mut out = Vec::new();
        for i in 0..12 {
            out.push(example(
                &format!("Rs.{} credited to your A/c X{} via UPI Ref {}", 100 + i * 37, 1000 + i, 400000 + i),
                "VM-SBIINB",
                Label::FinancialTransaction,
            ));
            out.push(example(
                &format!("Your OTP for login is {}. Do not share it with anyone", 100000 + i * 7919),
                "AD-HDFCBK",
                Label::Otp,
            ));
            out.push(example(
                &format!("Flat {}% off on fashion this weekend only, shop now", 10 + i),
                "VK-MYNTRA",
                Label::Promotional,
            ));
            out.push(example(
                &format!("hey are we still meeting at {} pm today", 1 + i % 12),
                "+919876543210",
                Label::Personal,
            ));
        }
        out
    }

    #[test]
    fn test_train_and_predict() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        assert!(model.vocabulary_size() > 0);

        let sample = example("Your OTP for payment is 774411. Do not share it", "AD-HDFCBK", Label::Otp);
        let result = model.predict(&sample.text, &sample.features);
        assert_eq!(result.label, Label::Otp);
        assert_eq!(result.method, Method::MlEnsemble);
        assert!((0.0..=1.0).contains(&result.confidence));

        let proba = model.predict_proba(&sample.text, &sample.features);
        assert_eq!(proba.len(), Label::ALL.len());
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_corpus_is_error() {
        assert!(ModelSnapshot::train(&[], &small_config()).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        let dir = std::env::temp_dir().join(format!("smsfin-model-{}", std::process::id()));
        let path = dir.join("model.json");
        model.save(&path).unwrap();

        let loaded = ModelSnapshot::load(&path).unwrap();
        let sample = example("Rs.500 credited to your A/c X1234 via UPI", "VM-SBIINB", Label::FinancialTransaction);
        assert_eq!(
            model.predict(&sample.text, &sample.features),
            loaded.predict(&sample.text, &sample.features)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_other_feature_layout() {
        let mut model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        model.feature_names.pop();
        let dir = std::env::temp_dir().join(format!("smsfin-layout-{}", std::process::id()));
        let path = dir.join("model.json");
        model.save(&path).unwrap();

        let err = ModelSnapshot::load(&path).unwrap_err();
        assert!(err.to_string().contains("feature layout"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(ModelSnapshot::load(Path::new("/nonexistent/model.json")).is_err());
    }
}
