use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::classifier::{self, LabeledExample, ModelRegistry, ModelSnapshot};
use crate::config::Config;
use crate::dedup::MessageTracker;
use crate::extractor::Extractor;
use crate::fraud::{FraudDetector, SpamType};
use crate::labeler::Labeler;
use crate::sms::{self, Label, LabelResult, Method, RawMessage, Transaction};
use crate::training::ModelTrainer;

/// What the core reports for one input message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub sms_id: String,
    pub label: LabelResult,
    pub is_spam: bool,
    pub spam_type: Option<SpamType>,
    pub spam_confidence: f64,
    pub spam_reasons: Vec<String>,
    /// The `(user_id, sms_id)` pair already produced a transaction; no new one is emitted.
    pub duplicate: bool,
    pub transaction: Option<Transaction>,
}

/// Result of running the pipeline on one user's batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub user_id: String,
    pub processed: usize,
    pub transactions_found: usize,
    pub spam_detected: usize,
    pub anomalies_detected: usize,
    pub duplicates: usize,
    pub ml_refined: usize,
    pub outcomes: Vec<MessageOutcome>,
}

/// One message after the pure per-message stages.
#[derive(Debug, Clone)]
pub struct Classified {
    pub outcome: MessageOutcome,
    pub timestamp_ms: i64,
    /// Set when the rule engine was confident enough for the result to be
    /// reused as a training label.
    pub training_example: Option<LabeledExample>,
}

/// Orchestrates the per-message stages and the per-user steps after them:
/// 1. Preprocess and rule labeling
/// 2. Ensemble fallback for low-confidence results
/// 3. Spam screening and field extraction
/// 4. Anomaly scoring against the user's history
/// 5. Feeding confident labels to the retraining corpus
pub struct SmsPipeline {
    labeler: Labeler,
    extractor: Extractor,
    fraud: FraudDetector,
    tracker: MessageTracker,
    trainer: Arc<ModelTrainer>,
    confidence_threshold: f64,
    workers: usize,
}

impl SmsPipeline {
    /// Build every stage from configuration. Errors here are fatal startup
    /// errors; nothing after this point fails a batch.
    pub fn init(config: &Config) -> eyre::Result<Self> {
        let registry = match &config.classifier.model_path {
            Some(path) => ModelRegistry::load_from_path(Path::new(path)),
            None => ModelRegistry::new(),
        };
        let trainer = Arc::new(ModelTrainer::new(config, Arc::new(registry)));
        Self::with_trainer(config, trainer)
    }

    pub fn with_trainer(config: &Config, trainer: Arc<ModelTrainer>) -> eyre::Result<Self> {
        let extractor = Extractor::from_config(config)?;
        let fraud = FraudDetector::new(config, extractor.offset())?;
        let labeler = Labeler::new();
        tracing::info!(
            rules = labeler.rule_names().len(),
            banks = extractor.banks().len(),
            model_loaded = trainer.registry().is_loaded(),
            "SMS pipeline initialized"
        );

        Ok(Self {
            labeler,
            extractor,
            fraud,
            tracker: MessageTracker::new(),
            trainer,
            confidence_threshold: config.classifier.confidence_threshold,
            workers: config.pipeline.workers.max(1),
        })
    }

    pub fn trainer(&self) -> &Arc<ModelTrainer> {
        &self.trainer
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.trainer.registry()
    }

    pub fn fraud(&self) -> &FraudDetector {
        &self.fraud
    }

    /// Pure per-message classification against a fixed model snapshot.
    pub fn classify_message(&self, msg: &RawMessage, model: Option<&ModelSnapshot>, duplicate: bool) -> Classified {
        let (text, features) = sms::preprocess(msg);
        let rule = self.labeler.label(&text, &msg.sender, &features);

        let training_example = (rule.confidence >= self.confidence_threshold && !duplicate).then(|| LabeledExample {
            text: text.clone(),
            features: features.clone(),
            label: rule.label,
        });

        let label = classifier::refine(rule, &text, &features, model, self.confidence_threshold);
        let spam = self.fraud.check_spam(&msg.body, &msg.sender);
        let is_spam = spam.is_spam || label.label == Label::Spam;

        let transaction = if duplicate {
            None
        } else {
            self.extractor.extract(&text, msg, &label).map(|mut txn| {
                txn.is_spam = is_spam;
                txn
            })
        };

        Classified {
            outcome: MessageOutcome {
                sms_id: msg.sms_id.clone(),
                label,
                is_spam,
                spam_type: spam.spam_type,
                spam_confidence: spam.confidence,
                spam_reasons: spam.reasons,
                duplicate,
                transaction,
            },
            timestamp_ms: msg.timestamp,
            training_example,
        }
    }

    fn classify_chunk(&self, chunk: &[(RawMessage, bool)], model: Option<&ModelSnapshot>) -> Vec<Classified> {
        chunk
            .iter()
            .map(|(msg, duplicate)| self.classify_message(msg, model, *duplicate))
            .collect()
    }

    /// Process one user's batch. Messages are classified in parallel chunks
    /// on the blocking pool; anomaly scoring then runs once for the user.
    pub async fn process_batch(self: &Arc<Self>, user_id: &str, messages: Vec<RawMessage>) -> BatchResult {
        if messages.is_empty() {
            return BatchResult {
                user_id: user_id.to_string(),
                ..BatchResult::default()
            };
        }

        // Dedup runs in input order so the first copy of an id wins. Pairs
        // are only recorded once they yield a transaction (see finish_batch).
        let mut in_batch = HashSet::with_capacity(messages.len());
        let tagged: Vec<(RawMessage, bool)> = messages
            .into_iter()
            .map(|m| {
                let duplicate = self.tracker.contains(user_id, &m.sms_id) || !in_batch.insert(m.sms_id.clone());
                (m, duplicate)
            })
            .collect();

        let model = self.registry().current();
        let chunk_size = tagged.len().div_ceil(self.workers);
        let chunks: Vec<Vec<(RawMessage, bool)>> = tagged.chunks(chunk_size).map(|c| c.to_vec()).collect();

        let handles = chunks.into_iter().map(|chunk| {
            let pipeline = Arc::clone(self);
            let model = model.clone();
            let ids: Vec<(String, bool, i64)> = chunk
                .iter()
                .map(|(m, duplicate)| (m.sms_id.clone(), *duplicate, m.timestamp))
                .collect();
            let task = tokio::task::spawn_blocking(move || pipeline.classify_chunk(&chunk, model.as_deref()));
            async move { (ids, task.await) }
        });

        let mut classified: Vec<Classified> = Vec::with_capacity(tagged.len());
        for (ids, joined) in join_all(handles).await {
            match joined {
                Ok(items) => classified.extend(items),
                Err(e) => {
                    tracing::error!(user_id, error = %e, count = ids.len(), "Classification chunk failed");
                    classified.extend(
                        ids.into_iter()
                            .map(|(sms_id, duplicate, timestamp_ms)| unclassified(sms_id, duplicate, timestamp_ms)),
                    );
                }
            }
        }

        self.finish_batch(user_id, classified)
    }

    fn finish_batch(&self, user_id: &str, classified: Vec<Classified>) -> BatchResult {
        let mut training = Vec::new();
        let mut outcomes = Vec::with_capacity(classified.len());
        let mut timestamps = Vec::with_capacity(classified.len());
        for mut item in classified {
            // A concurrent batch may have claimed the pair since dispatch.
            if item.outcome.transaction.is_some() && !self.tracker.first_seen(user_id, &item.outcome.sms_id) {
                item.outcome.transaction = None;
                item.outcome.duplicate = true;
                item.training_example = None;
            }
            if let Some(example) = item.training_example {
                training.push(example);
            }
            timestamps.push(item.timestamp_ms);
            outcomes.push(item.outcome);
        }

        let mut scored: Vec<(&mut Transaction, i64)> = outcomes
            .iter_mut()
            .zip(&timestamps)
            .filter_map(|(o, ts)| o.transaction.as_mut().map(|t| (t, *ts)))
            .collect();
        self.fraud.annotate_anomalies(user_id, &mut scored);

        if !training.is_empty() {
            self.trainer.record(training);
        }

        let result = BatchResult {
            user_id: user_id.to_string(),
            processed: outcomes.len(),
            transactions_found: outcomes.iter().filter(|o| o.transaction.is_some()).count(),
            spam_detected: outcomes.iter().filter(|o| o.is_spam).count(),
            anomalies_detected: outcomes
                .iter()
                .filter(|o| o.transaction.as_ref().is_some_and(|t| t.is_anomaly))
                .count(),
            duplicates: outcomes.iter().filter(|o| o.duplicate).count(),
            ml_refined: outcomes.iter().filter(|o| o.label.method == Method::MlEnsemble).count(),
            outcomes,
        };

        tracing::info!(
            user_id,
            processed = result.processed,
            transactions = result.transactions_found,
            spam = result.spam_detected,
            anomalies = result.anomalies_detected,
            duplicates = result.duplicates,
            tracked = self.tracker.len(),
            "Batch processed"
        );
        result
    }
}

/// Placeholder for a message whose classification chunk panicked. Its pair is
/// never recorded, so the message can be resubmitted.
fn unclassified(sms_id: String, duplicate: bool, timestamp_ms: i64) -> Classified {
    Classified {
        outcome: MessageOutcome {
            sms_id,
            label: LabelResult::new(Label::Personal, "unclassified", 0.0, Method::RuleBased),
            is_spam: false,
            spam_type: None,
            spam_confidence: 0.0,
            spam_reasons: Vec::new(),
            duplicate,
            transaction: None,
        },
        timestamp_ms,
        training_example: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sms::{Category, TransactionType};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    const SCENARIO_1: &str = "Dear SBI User, your A/c X1230-credited by Rs.1000 on 03Oct25 transfer from SUBHASH BOKADE Ref No 091542697620 -SBI";

    fn pipeline() -> Arc<SmsPipeline> {
        Arc::new(SmsPipeline::init(&Config::default()).unwrap())
    }

    fn msg(id: &str, sender: &str, body: &str) -> RawMessage {
        RawMessage::new(id, sender, body, 1_759_465_800_000)
    }

    #[tokio::test]
    async fn test_scenario_bank_credit() {
        let p = pipeline();
        let result = p.process_batch("user-1", vec![msg("1", "VM-SBIINB", SCENARIO_1)]).await;
        let outcome = &result.outcomes[0];
        assert_eq!(outcome.label.label, Label::FinancialTransaction);
        assert_eq!(outcome.label.sub_label, "credit");
        assert!(!outcome.is_spam);

        let txn = outcome.transaction.as_ref().unwrap();
        assert_eq!(txn.amount, BigDecimal::from_str("1000").unwrap());
        assert_eq!(txn.transaction_type, TransactionType::Credit);
        assert_eq!(txn.bank_name, "State Bank of India");
        assert_eq!(txn.counterparty.as_deref(), Some("SUBHASH BOKADE"));
        assert_eq!(txn.reference_number.as_deref(), Some("091542697620"));
        assert_eq!(txn.category, Category::Transfer);
        assert_eq!(txn.anomaly_score, 0.0);
        assert_eq!(result.transactions_found, 1);
    }

    #[tokio::test]
    async fn test_scenario_lottery_spam() {
        let p = pipeline();
        let result = p
            .process_batch(
                "user-1",
                vec![msg("2", "VK-OFFERS", "You have won ₹1 crore! Click http://bit.ly/xyz to claim now")],
            )
            .await;
        let outcome = &result.outcomes[0];
        assert!(matches!(outcome.label.label, Label::Spam | Label::Promotional));
        assert!(outcome.is_spam);
        assert!(outcome.transaction.is_none());
        assert_eq!(result.spam_detected, 1);
    }

    #[tokio::test]
    async fn test_scenario_otp() {
        let p = pipeline();
        let result = p
            .process_batch("user-1", vec![msg("3", "AD-HDFCBK", "Your OTP for login is 482913. Do not share.")])
            .await;
        assert_eq!(result.outcomes[0].label.label, Label::Otp);
        assert!(result.outcomes[0].transaction.is_none());
    }

    #[tokio::test]
    async fn test_resubmission_never_duplicates_transactions() {
        let p = pipeline();
        let first = p.process_batch("user-1", vec![msg("1", "VM-SBIINB", SCENARIO_1)]).await;
        let second = p
            .process_batch(
                "user-1",
                vec![msg("1", "VM-SBIINB", SCENARIO_1), msg("1", "VM-SBIINB", SCENARIO_1)],
            )
            .await;
        assert_eq!(first.transactions_found, 1);
        assert_eq!(second.transactions_found, 0);
        assert_eq!(second.duplicates, 2);
        assert!(second.outcomes.iter().all(|o| o.label.label == Label::FinancialTransaction));

        // Same sms_id for a different user is not a duplicate.
        let other = p.process_batch("user-2", vec![msg("1", "VM-SBIINB", SCENARIO_1)]).await;
        assert_eq!(other.transactions_found, 1);
    }

    #[tokio::test]
    async fn test_in_batch_duplicate_keeps_first() {
        let p = pipeline();
        let result = p
            .process_batch(
                "user-1",
                vec![msg("9", "VM-SBIINB", SCENARIO_1), msg("9", "VM-SBIINB", SCENARIO_1)],
            )
            .await;
        assert!(!result.outcomes[0].duplicate);
        assert!(result.outcomes[0].transaction.is_some());
        assert!(result.outcomes[1].duplicate);
        assert!(result.outcomes[1].transaction.is_none());
    }

    #[tokio::test]
    async fn test_messages_without_transactions_do_not_claim_their_id() {
        let p = pipeline();
        let otp = p
            .process_batch("user-1", vec![msg("5", "AD-HDFCBK", "Your OTP for login is 482913. Do not share.")])
            .await;
        assert!(!otp.outcomes[0].duplicate);

        let again = p
            .process_batch("user-1", vec![msg("5", "AD-HDFCBK", "Your OTP for login is 482913. Do not share.")])
            .await;
        assert!(!again.outcomes[0].duplicate);

        let credit = p.process_batch("user-1", vec![msg("5", "VM-SBIINB", SCENARIO_1)]).await;
        assert_eq!(credit.transactions_found, 1);
        assert_eq!(credit.duplicates, 0);
    }

    #[tokio::test]
    async fn test_failed_chunk_messages_can_be_resubmitted() {
        let p = pipeline();
        let failed = p.finish_batch(
            "user-1",
            vec![
                unclassified("1".to_string(), false, 1_759_465_800_000),
                unclassified("2".to_string(), true, 1_759_465_900_000),
            ],
        );
        assert_eq!(failed.processed, 2);
        assert_eq!(failed.transactions_found, 0);
        assert!(!failed.outcomes[0].duplicate);
        assert!(failed.outcomes[1].duplicate);
        assert_eq!(failed.outcomes[0].label.sub_label, "unclassified");

        let retry = p.process_batch("user-1", vec![msg("1", "VM-SBIINB", SCENARIO_1)]).await;
        assert_eq!(retry.transactions_found, 1);
        assert!(!retry.outcomes[0].duplicate);
    }

    #[test]
    fn test_unclassified_keeps_duplicate_flag_and_timestamp() {
        let item = unclassified("7".to_string(), true, 1_759_465_800_000);
        assert!(item.outcome.duplicate);
        assert_eq!(item.timestamp_ms, 1_759_465_800_000);
        assert!(item.outcome.transaction.is_none());
        assert!(item.training_example.is_none());
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order_and_never_fail() {
        let mut config = Config::default();
        config.pipeline.workers = 3;
        let p = Arc::new(SmsPipeline::init(&config).unwrap());

        let bodies = [
            SCENARIO_1,
            "",
            "Your OTP for login is 482913. Do not share.",
            "\u{200b}\u{200b}",
            "Rs.",
            "hey, call me when you are free",
            "Flat 50% off on all orders, shop now!",
        ];
        let messages: Vec<RawMessage> = bodies
            .iter()
            .enumerate()
            .map(|(i, b)| msg(&i.to_string(), "VM-SBIINB", b))
            .collect();
        let result = p.process_batch("user-1", messages).await;

        assert_eq!(result.processed, bodies.len());
        for (i, outcome) in result.outcomes.iter().enumerate() {
            assert_eq!(outcome.sms_id, i.to_string());
            assert!((0.0..=1.0).contains(&outcome.label.confidence));
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let p = pipeline();
        let result = p.process_batch("user-1", Vec::new()).await;
        assert_eq!(result.processed, 0);
        assert!(result.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_confident_rules_feed_training_corpus() {
        let p = pipeline();
        p.process_batch(
            "user-1",
            vec![
                msg("1", "VM-SBIINB", SCENARIO_1),
                msg("2", "AD-HDFCBK", "Your OTP for login is 482913. Do not share."),
            ],
        )
        .await;
        assert_eq!(p.trainer().status().new_since_training, 2);
    }

    #[test]
    fn test_classify_message_is_deterministic() {
        let p = SmsPipeline::init(&Config::default()).unwrap();
        let m = msg("1", "VM-SBIINB", SCENARIO_1);
        let a = p.classify_message(&m, None, false);
        let b = p.classify_message(&m, None, false);
        assert_eq!(a.outcome.label, b.outcome.label);
        assert_eq!(a.outcome.transaction, b.outcome.transaction);
    }
}
