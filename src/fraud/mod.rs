pub mod baseline;
pub mod isolation;
pub mod spam;
pub mod types;

pub use baseline::{BaselineRegistry, HistoryPoint};
pub use spam::SpamChecker;
pub use types::{AnomalyVerdict, SpamType, SpamVerdict};

use chrono::FixedOffset;

use crate::config::Config;
use crate::sms::Transaction;

/// Spam screening for every message and anomaly scoring for emitted
/// transactions. Both checks are advisory and never fail a message.
pub struct FraudDetector {
    spam: SpamChecker,
    baselines: BaselineRegistry,
    anomaly_enabled: bool,
    offset: FixedOffset,
}

impl FraudDetector {
    pub fn new(config: &Config, offset: FixedOffset) -> eyre::Result<Self> {
        let spam = SpamChecker::new(&config.spam)?;
        tracing::info!(patterns = spam.pattern_count(), "Spam patterns loaded");
        Ok(Self {
            spam,
            baselines: BaselineRegistry::new(config.anomaly.clone()),
            anomaly_enabled: config.anomaly.enabled,
            offset,
        })
    }

    pub fn check_spam(&self, body: &str, sender: &str) -> SpamVerdict {
        self.spam.check(body, sender)
    }

    pub fn baselines(&self) -> &BaselineRegistry {
        &self.baselines
    }

    /// Score one user's new transactions against their history and write
    /// `anomaly_score` / `is_anomaly` in place. `timestamp_ms` is the
    /// message time each transaction came from.
    pub fn annotate_anomalies(&self, user_id: &str, items: &mut [(&mut Transaction, i64)]) {
        if !self.anomaly_enabled || items.is_empty() {
            return;
        }
        let points: Vec<HistoryPoint> = items
            .iter()
            .map(|(txn, ts)| HistoryPoint::from_transaction(txn, *ts, self.offset))
            .collect();
        let verdicts = self.baselines.score_and_record(user_id, points);

        let mut flagged = 0usize;
        for ((txn, _), verdict) in items.iter_mut().zip(verdicts) {
            txn.anomaly_score = verdict.score;
            txn.is_anomaly = verdict.is_anomaly;
            if verdict.is_anomaly {
                flagged += 1;
                tracing::info!(
                    user_id,
                    sms_id = %txn.sms_id,
                    score = verdict.score,
                    "Anomalous transaction"
                );
            }
        }
        tracing::debug!(user_id, count = items.len(), flagged, "Scored transactions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    use crate::sms::{Category, PaymentMethod, TransactionType};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn txn(id: usize, amount: &str) -> Transaction {
        Transaction {
            sms_id: format!("sms-{}", id),
            sender: "VM-HDFCBK".to_string(),
            receiver: "Unknown".to_string(),
            amount: BigDecimal::from_str(amount).unwrap(),
            transaction_type: TransactionType::Debit,
            payment_method: PaymentMethod::Upi,
            bank_name: "HDFC Bank".to_string(),
            account_number: Some("XX1234".to_string()),
            counterparty: Some(format!("Shop {}", id % 4)),
            reference_number: None,
            transaction_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            category: Category::Shopping,
            category_edited: false,
            description: String::new(),
            is_spam: false,
            anomaly_score: 0.0,
            is_anomaly: false,
        }
    }

    fn ts(i: usize) -> i64 {
        1_759_300_000_000 + i as i64 * 86_400_000
    }

    fn seed(detector: &FraudDetector, user: &str, n: usize) {
        for i in 0..n {
            let mut t = txn(i, &format!("{}", 900 + (i % 5) * 50));
            detector.annotate_anomalies(user, &mut [(&mut t, ts(i))]);
        }
    }

    #[test]
    fn test_scenario_large_amount_with_history() {
        let detector = FraudDetector::new(&Config::default(), ist()).unwrap();
        seed(&detector, "user-a", 20);

        // 50x the historical average of 1000.
        let mut big = txn(20, "50000");
        detector.annotate_anomalies("user-a", &mut [(&mut big, ts(20))]);
        assert!(big.anomaly_score > 0.7, "score {}", big.anomaly_score);
        assert!(big.is_anomaly);
    }

    #[test]
    fn test_scenario_large_amount_cold_start() {
        let detector = FraudDetector::new(&Config::default(), ist()).unwrap();
        seed(&detector, "user-b", 19);

        let mut big = txn(19, "50000");
        detector.annotate_anomalies("user-b", &mut [(&mut big, ts(19))]);
        assert_eq!(big.anomaly_score, 0.0);
        assert!(!big.is_anomaly);
    }

    #[test]
    fn test_disabled_anomaly_check() {
        let mut config = Config::default();
        config.anomaly.enabled = false;
        let detector = FraudDetector::new(&config, ist()).unwrap();
        seed(&detector, "user-c", 30);
        assert_eq!(detector.baselines().history_len("user-c"), 0);
    }

    #[test]
    fn test_scenario_lottery_spam() {
        let detector = FraudDetector::new(&Config::default(), ist()).unwrap();
        let verdict = detector.check_spam("You have won ₹1 crore! Click http://bit.ly/xyz to claim now", "VK-WINNER");
        assert!(verdict.is_spam);
    }
}
