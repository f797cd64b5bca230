use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::classifier::{LabeledExample, ModelMetrics, ModelRegistry, ModelSnapshot};
use crate::config::{ClassifierConfig, Config, TrainingConfig};
use crate::sms::Label;

use super::corpus::{parse_corpus_csv, Corpus};
use super::metrics::{accuracy, weighted_f1};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    Threshold,
    #[default]
    Manual,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrainRequest {
    #[serde(default)]
    pub total_sms_trained: u64,
    #[serde(default)]
    pub new_sms_count: u64,
    #[serde(default)]
    pub triggered_by: TriggeredBy,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainResponse {
    pub accuracy: f64,
    pub f1_score: f64,
    pub model_version: u64,
    /// True when the candidate scored worse than the live model by more
    /// than the allowed drop and was discarded.
    pub rolled_back: bool,
    pub train_samples: usize,
    pub test_samples: usize,
    pub triggered_by: TriggeredBy,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingStatus {
    pub is_training: bool,
    pub model_loaded: bool,
    pub model_version: u64,
    pub last_trained_count: u64,
    pub new_since_training: u64,
    pub threshold: u64,
    pub progress_to_retrain: u32,
    pub corpus_size: usize,
    pub last_accuracy: f64,
    pub last_f1_score: f64,
    pub last_trained_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct TrainingState {
    last_trained_count: u64,
    last_accuracy: f64,
    last_f1_score: f64,
    last_trained_at: Option<DateTime<Utc>>,
}

/// Clears the in-progress flag however `retrain` exits.
struct TrainingGuard<'a>(&'a AtomicBool);

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builds new model versions off the inference path and publishes them
/// through the shared registry.
pub struct ModelTrainer {
    config: TrainingConfig,
    classifier: ClassifierConfig,
    registry: Arc<ModelRegistry>,
    seed_corpus: Vec<LabeledExample>,
    corpus: Corpus,
    observed: AtomicU64,
    is_training: AtomicBool,
    state: Mutex<TrainingState>,
}

impl ModelTrainer {
    pub fn new(config: &Config, registry: Arc<ModelRegistry>) -> Self {
        let seed_corpus = match &config.training.corpus_path {
            Some(path) => match parse_corpus_csv(path) {
                Ok(examples) => examples,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load seed corpus, continuing without");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut state = TrainingState::default();
        if let Some(model) = registry.current() {
            state.last_accuracy = model.metrics.accuracy;
            state.last_f1_score = model.metrics.f1_score;
            state.last_trained_at = Some(model.trained_at);
        }

        Self {
            config: config.training.clone(),
            classifier: config.classifier.clone(),
            registry,
            seed_corpus,
            corpus: Corpus::new(config.training.max_corpus),
            observed: AtomicU64::new(0),
            is_training: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Add confidently auto-labeled messages to the training corpus.
    pub fn record(&self, examples: Vec<LabeledExample>) {
        let added = self.corpus.extend(examples);
        self.observed.fetch_add(added as u64, Ordering::AcqRel);
    }

    pub fn new_since_training(&self) -> u64 {
        let observed = self.observed.load(Ordering::Acquire);
        observed.saturating_sub(self.state.lock().last_trained_count)
    }

    pub fn should_retrain(&self) -> bool {
        self.config.enabled
            && !self.is_training.load(Ordering::Acquire)
            && self.new_since_training() >= self.config.new_sms_threshold
    }

    pub fn status(&self) -> TrainingStatus {
        let new_since = self.new_since_training();
        let threshold = self.config.new_sms_threshold;
        let progress = if threshold == 0 {
            100
        } else {
            (new_since.saturating_mul(100) / threshold).min(100) as u32
        };
        let state = self.state.lock();
        TrainingStatus {
            is_training: self.is_training.load(Ordering::Acquire),
            model_loaded: self.registry.is_loaded(),
            model_version: self.registry.version(),
            last_trained_count: state.last_trained_count,
            new_since_training: new_since,
            threshold,
            progress_to_retrain: progress,
            corpus_size: self.seed_corpus.len() + self.corpus.len(),
            last_accuracy: state.last_accuracy,
            last_f1_score: state.last_f1_score,
            last_trained_at: state.last_trained_at,
        }
    }

    /// Train, evaluate on a holdout split, and publish unless the candidate
    /// regressed. CPU-bound; call from a blocking context.
    pub fn retrain(&self, request: RetrainRequest) -> eyre::Result<RetrainResponse> {
        if self
            .is_training
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(eyre::eyre!("Training already in progress"));
        }
        let _guard = TrainingGuard(&self.is_training);

        let observed = self.observed.load(Ordering::Acquire);
        let mut examples: Vec<LabeledExample> = self.seed_corpus.clone();
        examples.extend(self.corpus.snapshot());
        if examples.len() < self.config.min_samples.max(2) {
            return Err(eyre::eyre!(
                "Not enough training samples: {} (need {})",
                examples.len(),
                self.config.min_samples.max(2)
            ));
        }

        tracing::info!(
            triggered_by = request.triggered_by.as_str(),
            total_sms_trained = request.total_sms_trained,
            new_sms_count = request.new_sms_count,
            samples = examples.len(),
            "Retraining classifier"
        );

        let mut rng = StdRng::seed_from_u64(self.classifier.seed);
        examples.shuffle(&mut rng);
        let test_len = ((examples.len() as f64 * self.config.holdout_fraction).round() as usize)
            .clamp(1, examples.len() - 1);
        let test = examples.split_off(examples.len() - test_len);
        let train = examples;

        let mut candidate = ModelSnapshot::train(&train, &self.classifier)?;
        let (acc, f1) = evaluate(&candidate, &test);
        candidate.metrics = ModelMetrics {
            accuracy: acc,
            f1_score: f1,
            train_samples: train.len(),
            test_samples: test.len(),
        };

        let live_accuracy = self.registry.current().map(|live| evaluate(&live, &test).0);
        let rolled_back = matches!(live_accuracy, Some(live) if acc + self.config.max_accuracy_drop < live);

        let model_version = if rolled_back {
            tracing::warn!(
                candidate_accuracy = acc,
                live_accuracy = live_accuracy.unwrap_or_default(),
                "Candidate model regressed, keeping live model"
            );
            self.registry.version()
        } else {
            let version = self.registry.publish(candidate);
            if let (Some(path), Some(published)) = (&self.classifier.model_path, self.registry.current()) {
                if let Err(e) = published.save(Path::new(path)) {
                    tracing::error!(error = %e, "Failed to persist model, serving it from memory only");
                }
            }
            tracing::info!(version, accuracy = acc, f1_score = f1, "Published classifier model");
            version
        };

        let mut state = self.state.lock();
        state.last_trained_count = observed;
        if !rolled_back {
            state.last_accuracy = acc;
            state.last_f1_score = f1;
            state.last_trained_at = Some(Utc::now());
        }

        Ok(RetrainResponse {
            accuracy: acc,
            f1_score: f1,
            model_version,
            rolled_back,
            train_samples: train.len(),
            test_samples: test.len(),
            triggered_by: request.triggered_by,
        })
    }

    /// Run `retrain` on the blocking pool.
    pub async fn retrain_blocking(self: Arc<Self>, request: RetrainRequest) -> eyre::Result<RetrainResponse> {
        tokio::task::spawn_blocking(move || self.retrain(request))
            .await
            .map_err(|e| eyre::eyre!("Training task panicked: {}", e))?
    }

    /// Poll the new-message counter and retrain when it crosses the threshold.
    pub async fn run_monitor(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = Duration::from_secs(self.config.check_interval_secs);
        tracing::info!(
            threshold = self.config.new_sms_threshold,
            check_interval_secs = self.config.check_interval_secs,
            "Retrain monitor started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown received, stopping retrain monitor");
                    break;
                }
            }

            if !self.should_retrain() {
                continue;
            }
            let request = RetrainRequest {
                total_sms_trained: self.state.lock().last_trained_count,
                new_sms_count: self.new_since_training(),
                triggered_by: TriggeredBy::Threshold,
            };
            match self.clone().retrain_blocking(request).await {
                Ok(response) => tracing::info!(
                    accuracy = response.accuracy,
                    f1_score = response.f1_score,
                    rolled_back = response.rolled_back,
                    "Threshold retrain finished"
                ),
                Err(e) => tracing::error!(error = %e, "Threshold retrain failed"),
            }
        }
    }
}

fn evaluate(model: &ModelSnapshot, test: &[LabeledExample]) -> (f64, f64) {
    let truth: Vec<usize> = test.iter().map(|e| e.label.index()).collect();
    let predicted: Vec<usize> = test
        .iter()
        .map(|e| model.predict(&e.text, &e.features).label.index())
        .collect();
    (
        accuracy(&truth, &predicted),
        weighted_f1(&truth, &predicted, Label::ALL.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ensemble::tests::{corpus, example, small_config};

    fn config(min_samples: usize) -> Config {
        let mut config = Config::default();
        config.classifier = small_config();
        config.training.min_samples = min_samples;
        config.training.new_sms_threshold = 10;
        config
    }

    #[test]
    fn test_retrain_publishes_model() {
        let registry = Arc::new(ModelRegistry::new());
        let trainer = ModelTrainer::new(&config(20), registry.clone());
        trainer.record(corpus());
        assert!(trainer.should_retrain());

        let response = trainer.retrain(RetrainRequest::default()).unwrap();
        assert!(!response.rolled_back);
        assert_eq!(response.model_version, 1);
        assert!((0.0..=1.0).contains(&response.accuracy));
        assert!((0.0..=1.0).contains(&response.f1_score));
        assert_eq!(response.train_samples + response.test_samples, corpus().len());
        assert!(registry.is_loaded());

        let status = trainer.status();
        assert_eq!(status.new_since_training, 0);
        assert_eq!(status.progress_to_retrain, 0);
        assert!(!status.is_training);
        assert!(!trainer.should_retrain());
    }

    #[test]
    fn test_too_few_samples_is_error() {
        let trainer = ModelTrainer::new(&config(100), Arc::new(ModelRegistry::new()));
        trainer.record(corpus());
        assert!(trainer.retrain(RetrainRequest::default()).is_err());
        assert!(!trainer.status().is_training);
    }

    #[test]
    fn test_regressed_candidate_is_rolled_back() {
        let registry = Arc::new(ModelRegistry::new());
        let good = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        registry.publish(good);

        // No trees and no epochs: the candidate can only guess the majority class.
        let mut cfg = config(20);
        cfg.classifier.gbt_rounds = 0;
        cfg.classifier.forest_trees = 0;
        cfg.classifier.linear_epochs = 0;
        let trainer = ModelTrainer::new(&cfg, registry.clone());
        trainer.record(corpus());

        let response = trainer.retrain(RetrainRequest::default()).unwrap();
        assert!(response.rolled_back, "candidate accuracy {}", response.accuracy);
        assert_eq!(response.model_version, 1);
        assert_eq!(registry.version(), 1);
        assert_eq!(trainer.status().new_since_training, 0);
    }

    #[test]
    fn test_progress_tracks_new_messages() {
        let trainer = ModelTrainer::new(&config(20), Arc::new(ModelRegistry::new()));
        trainer.record(
            (0..5)
                .map(|i| example(&format!("hello {}", i), "+919812345678", Label::Personal))
                .collect(),
        );
        let status = trainer.status();
        assert_eq!(status.new_since_training, 5);
        assert_eq!(status.progress_to_retrain, 50);
        assert!(!trainer.should_retrain());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let trainer = Arc::new(ModelTrainer::new(&config(20), Arc::new(ModelRegistry::new())));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(trainer.run_monitor(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
