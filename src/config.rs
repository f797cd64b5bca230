use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub spam: SpamConfig,
    #[serde(default)]
    pub banks: Vec<BankConfig>,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

// ============================================================
// Pipeline Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Offset applied to message timestamps when deriving dates and hours.
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset_minutes: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timezone_offset_minutes: default_timezone_offset(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_timezone_offset() -> i32 {
    330
}

// ============================================================
// Classifier Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    pub model_path: Option<String>,
    #[serde(default = "default_tfidf_max_features")]
    pub tfidf_max_features: usize,
    #[serde(default = "default_tfidf_min_df")]
    pub tfidf_min_df: usize,
    #[serde(default = "default_tfidf_max_df")]
    pub tfidf_max_df: f64,
    #[serde(default = "default_gbt_rounds")]
    pub gbt_rounds: usize,
    #[serde(default = "default_gbt_depth")]
    pub gbt_depth: usize,
    #[serde(default = "default_gbt_learning_rate")]
    pub gbt_learning_rate: f64,
    #[serde(default = "default_gbt_column_sample")]
    pub gbt_column_sample: f64,
    #[serde(default = "default_forest_trees")]
    pub forest_trees: usize,
    #[serde(default = "default_forest_depth")]
    pub forest_depth: usize,
    #[serde(default = "default_linear_epochs")]
    pub linear_epochs: usize,
    #[serde(default = "default_linear_learning_rate")]
    pub linear_learning_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            model_path: None,
            tfidf_max_features: default_tfidf_max_features(),
            tfidf_min_df: default_tfidf_min_df(),
            tfidf_max_df: default_tfidf_max_df(),
            gbt_rounds: default_gbt_rounds(),
            gbt_depth: default_gbt_depth(),
            gbt_learning_rate: default_gbt_learning_rate(),
            gbt_column_sample: default_gbt_column_sample(),
            forest_trees: default_forest_trees(),
            forest_depth: default_forest_depth(),
            linear_epochs: default_linear_epochs(),
            linear_learning_rate: default_linear_learning_rate(),
            seed: default_seed(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.65
}

fn default_tfidf_max_features() -> usize {
    1500
}

fn default_tfidf_min_df() -> usize {
    2
}

fn default_tfidf_max_df() -> f64 {
    0.95
}

fn default_gbt_rounds() -> usize {
    200
}

fn default_gbt_depth() -> usize {
    6
}

fn default_gbt_learning_rate() -> f64 {
    0.1
}

fn default_gbt_column_sample() -> f64 {
    0.5
}

fn default_forest_trees() -> usize {
    100
}

fn default_forest_depth() -> usize {
    10
}

fn default_linear_epochs() -> usize {
    150
}

fn default_linear_learning_rate() -> f64 {
    0.5
}

fn default_seed() -> u64 {
    42
}

// ============================================================
// Anomaly Detection Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct AnomalyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prior transactions required before a user's baseline is scored against.
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    #[serde(default = "default_anomaly_threshold")]
    pub threshold: f64,
    #[serde(default = "default_anomaly_trees")]
    pub trees: usize,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_history: default_min_history(),
            threshold: default_anomaly_threshold(),
            trees: default_anomaly_trees(),
            sample_size: default_sample_size(),
            max_history: default_max_history(),
            seed: default_seed(),
        }
    }
}

fn default_min_history() -> usize {
    20
}

fn default_anomaly_threshold() -> f64 {
    0.7
}

fn default_anomaly_trees() -> usize {
    100
}

fn default_sample_size() -> usize {
    256
}

fn default_max_history() -> usize {
    500
}

// ============================================================
// Spam & Bank Tables
// ============================================================

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SpamConfig {
    /// Additional case-insensitive regexes flagged as phishing.
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BankConfig {
    pub code: String,
    pub name: String,
}

// ============================================================
// Training Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_new_sms_threshold")]
    pub new_sms_threshold: u64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// CSV with `body,sender,label` columns used to seed the corpus.
    pub corpus_path: Option<String>,
    #[serde(default = "default_max_corpus")]
    pub max_corpus: usize,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    /// A retrained model scoring more than this below the live one is discarded.
    #[serde(default = "default_max_accuracy_drop")]
    pub max_accuracy_drop: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            new_sms_threshold: default_new_sms_threshold(),
            check_interval_secs: default_check_interval(),
            corpus_path: None,
            max_corpus: default_max_corpus(),
            min_samples: default_min_samples(),
            holdout_fraction: default_holdout_fraction(),
            max_accuracy_drop: default_max_accuracy_drop(),
        }
    }
}

fn default_new_sms_threshold() -> u64 {
    200
}

fn default_check_interval() -> u64 {
    300
}

fn default_max_corpus() -> usize {
    20_000
}

fn default_min_samples() -> usize {
    50
}

fn default_holdout_fraction() -> f64 {
    0.2
}

fn default_max_accuracy_drop() -> f64 {
    0.02
}

// ============================================================
// API & Logging Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_api_port() -> u16 {
    8000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        let unit = |name: &str, value: f64| -> eyre::Result<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(eyre::eyre!("{} must be within [0, 1], got {}", name, value));
            }
            Ok(())
        };

        unit("classifier.confidence_threshold", self.classifier.confidence_threshold)?;
        unit("classifier.tfidf_max_df", self.classifier.tfidf_max_df)?;
        unit("classifier.gbt_column_sample", self.classifier.gbt_column_sample)?;
        unit("anomaly.threshold", self.anomaly.threshold)?;
        unit("training.holdout_fraction", self.training.holdout_fraction)?;

        if self.classifier.tfidf_max_features == 0 {
            return Err(eyre::eyre!("classifier.tfidf_max_features must be positive"));
        }
        if self.classifier.gbt_rounds == 0 || self.classifier.forest_trees == 0 {
            return Err(eyre::eyre!("Ensemble members need at least one tree"));
        }
        if self.anomaly.trees == 0 || self.anomaly.sample_size < 2 {
            return Err(eyre::eyre!(
                "anomaly.trees must be positive and anomaly.sample_size at least 2"
            ));
        }
        if self.pipeline.workers == 0 {
            return Err(eyre::eyre!("pipeline.workers must be positive"));
        }
        for bank in &self.banks {
            if bank.code.trim().is_empty() || bank.name.trim().is_empty() {
                return Err(eyre::eyre!(
                    "Bank entries need a code and a name, got '{}' => '{}'",
                    bank.code,
                    bank.name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[pipeline]
workers = 2

[classifier]
confidence_threshold = 0.6
model_path = "models/classifier.json"

[anomaly]
min_history = 30

[[banks]]
code = "CSBBNK"
name = "CSB Bank"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.timezone_offset_minutes, 330); // default
        assert_eq!(config.classifier.confidence_threshold, 0.6);
        assert_eq!(config.classifier.tfidf_max_features, 1500); // default
        assert_eq!(config.anomaly.min_history, 30);
        assert_eq!(config.anomaly.threshold, 0.7); // default
        assert_eq!(config.banks[0].name, "CSB Bank");
        assert_eq!(config.training.new_sms_threshold, 200); // default
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.classifier.gbt_rounds, 200);
        assert_eq!(config.classifier.forest_trees, 100);
        assert_eq!(config.api.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.classifier.tfidf_max_features, defaults.classifier.tfidf_max_features);
        assert_eq!(config.classifier.gbt_rounds, defaults.classifier.gbt_rounds);
        assert_eq!(config.classifier.forest_trees, defaults.classifier.forest_trees);
        assert_eq!(config.classifier.confidence_threshold, defaults.classifier.confidence_threshold);
        assert_eq!(config.anomaly.min_history, defaults.anomaly.min_history);
        assert_eq!(config.anomaly.sample_size, defaults.anomaly.sample_size);
        assert_eq!(config.training.new_sms_threshold, defaults.training.new_sms_threshold);
        assert_eq!(config.pipeline.workers, defaults.pipeline.workers);
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.classifier.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_bank_entry() {
        let mut config = Config::default();
        config.banks.push(BankConfig {
            code: " ".to_string(),
            name: "Nameless".to_string(),
        });
        assert!(config.validate().is_err());
    }
}
