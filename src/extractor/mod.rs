pub mod banks;
pub mod fields;

use bigdecimal::BigDecimal;
use chrono::FixedOffset;

use crate::config::Config;
use crate::sms::patterns;
use crate::sms::{Label, LabelResult, PaymentMethod, RawMessage, Transaction, TransactionType};

use self::banks::BankDirectory;

const UNKNOWN_BANK: &str = "Unknown";

/// Pulls structured transaction fields out of financial-transaction messages.
pub struct Extractor {
    banks: BankDirectory,
    offset: FixedOffset,
}

impl Extractor {
    pub fn new(banks: BankDirectory, offset: FixedOffset) -> Self {
        Self { banks, offset }
    }

    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let banks = BankDirectory::build(&config.banks)?;
        let offset = FixedOffset::east_opt(config.pipeline.timezone_offset_minutes * 60).ok_or_else(|| {
            eyre::eyre!(
                "Invalid timezone offset: {} minutes",
                config.pipeline.timezone_offset_minutes
            )
        })?;
        Ok(Self::new(banks, offset))
    }

    pub fn banks(&self) -> &BankDirectory {
        &self.banks
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Builds a [`Transaction`] from a message labeled `financial_transaction`.
    ///
    /// Returns `None` when the label is anything else, or when no amount or
    /// direction can be read. Every other field degrades to its default.
    pub fn extract(&self, text: &str, msg: &RawMessage, label: &LabelResult) -> Option<Transaction> {
        if label.label != Label::FinancialTransaction {
            return None;
        }

        let Some(amount) = fields::parse_amount(text) else {
            tracing::debug!(sms_id = %msg.sms_id, "No amount found, skipping transaction");
            return None;
        };

        let Some(transaction_type) = self.polarity(text, label) else {
            tracing::debug!(sms_id = %msg.sms_id, "No credit/debit direction, skipping transaction");
            return None;
        };

        let account_number = fields::parse_account(text);
        let counterparty =
            fields::parse_counterparty(text, |name| self.banks.from_body(name).is_some())
                .or_else(|| self.sender_display_name(&msg.sender));
        let payment_method = fields::parse_payment_method(text);
        let reference_number = fields::parse_reference(text);
        let bank_name = self
            .banks
            .resolve(&msg.sender, text)
            .unwrap_or_else(|| UNKNOWN_BANK.to_string());
        let transaction_date = fields::parse_date(text, msg.timestamp, self.offset);
        let category = fields::categorize(text, counterparty.as_deref());

        let receiver = match transaction_type {
            TransactionType::Debit => counterparty.clone().unwrap_or_else(|| "Unknown".to_string()),
            TransactionType::Credit => account_number.clone().unwrap_or_else(|| "Self".to_string()),
        };
        let description = describe(transaction_type, &amount, counterparty.as_deref(), payment_method);

        Some(Transaction {
            sms_id: msg.sms_id.clone(),
            sender: msg.sender.clone(),
            receiver,
            amount,
            transaction_type,
            payment_method,
            bank_name,
            account_number,
            counterparty,
            reference_number,
            transaction_date,
            category,
            category_edited: false,
            description,
            is_spam: false,
            anomaly_score: 0.0,
            is_anomaly: false,
        })
    }

    fn polarity(&self, text: &str, label: &LabelResult) -> Option<TransactionType> {
        if patterns::non_transaction_re().is_match(text) {
            return None;
        }
        patterns::direction(text).or(match label.sub_label.as_str() {
            "credit" => Some(TransactionType::Credit),
            "debit" => Some(TransactionType::Debit),
            _ => None,
        })
    }

    /// Sender as counterparty, unless it is a header, a number or a bank.
    fn sender_display_name(&self, sender: &str) -> Option<String> {
        let sender = sender.trim();
        if sender.is_empty()
            || sender.chars().any(|c| c.is_ascii_digit())
            || patterns::shortcode_sender_re().is_match(sender)
            || patterns::amount_re().is_match(sender)
            || self.banks.is_bank_code(sender)
            || self.banks.from_body(sender).is_some()
        {
            return None;
        }
        Some(sender.to_string())
    }
}

/// "Credit Rs.1000.00 from SUBHASH BOKADE via UPI".
fn describe(
    transaction_type: TransactionType,
    amount: &BigDecimal,
    counterparty: Option<&str>,
    method: PaymentMethod,
) -> String {
    let mut parts = vec![
        match transaction_type {
            TransactionType::Credit => "Credit".to_string(),
            TransactionType::Debit => "Debit".to_string(),
        },
        format!("Rs.{}", amount.with_scale(2)),
    ];
    if let Some(name) = counterparty {
        let preposition = match transaction_type {
            TransactionType::Credit => "from",
            TransactionType::Debit => "to",
        };
        parts.push(format!("{} {}", preposition, name));
    }
    if method != PaymentMethod::Other {
        parts.push(format!("via {}", method.as_str()));
    }
    parts.join(" ")
}
