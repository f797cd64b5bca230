use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One SMS or notification as captured on the device.
///
/// Field aliases match the Android content-provider export (`_id`, `address`,
/// `date`), and timestamps may arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub sms_id: String,
    #[serde(alias = "address", default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
    /// Receipt time in epoch milliseconds.
    #[serde(alias = "date", deserialize_with = "millis", default)]
    pub timestamp: i64,
    #[serde(deserialize_with = "optional_millis", default)]
    pub date_sent: Option<i64>,
}

impl RawMessage {
    pub fn new(sms_id: impl Into<String>, sender: impl Into<String>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sms_id: sms_id.into(),
            sender: sender.into(),
            body: body.into(),
            timestamp,
            date_sent: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn into_millis(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::Float(v) if v.is_finite() => Some(v as i64),
            Self::Float(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
            }
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(v) => v.to_string(),
        NumberOrString::Float(v) => v.to_string(),
        NumberOrString::Text(s) => s,
    })
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(NumberOrString::deserialize(deserializer)?
        .into_millis()
        .unwrap_or(0))
}

fn optional_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<NumberOrString>::deserialize(deserializer)?.and_then(NumberOrString::into_millis))
}

/// Primary message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    FinancialTransaction,
    Promotional,
    FinancialAlert,
    Personal,
    Otp,
    Spam,
}

impl Label {
    /// Fixed class order used by the ML models.
    pub const ALL: [Label; 6] = [
        Label::FinancialTransaction,
        Label::Promotional,
        Label::FinancialAlert,
        Label::Personal,
        Label::Otp,
        Label::Spam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialTransaction => "financial_transaction",
            Self::Promotional => "promotional",
            Self::FinancialAlert => "financial_alert",
            Self::Personal => "personal",
            Self::Otp => "otp",
            Self::Spam => "spam",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::FinancialTransaction => 0,
            Self::Promotional => 1,
            Self::FinancialAlert => 2,
            Self::Personal => 3,
            Self::Otp => 4,
            Self::Spam => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Label> {
        Self::ALL.get(index).copied()
    }

    /// Sub-label assigned when the ML stage picks a label the rules did not.
    pub fn default_sub_label(&self) -> &'static str {
        match self {
            Self::FinancialTransaction => "unknown_direction",
            Self::Promotional => "marketing",
            Self::FinancialAlert => "general_alert",
            Self::Personal => "p2p_message",
            Self::Otp => "verification",
            Self::Spam => "suspicious",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| eyre::eyre!("Unknown label '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RuleBased,
    MlEnsemble,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::MlEnsemble => "ml_ensemble",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResult {
    pub label: Label,
    pub sub_label: String,
    pub confidence: f64,
    pub method: Method,
}

impl LabelResult {
    /// Builds a result, clamping the confidence into `[0, 1]`.
    pub fn new(label: Label, sub_label: impl Into<String>, confidence: f64, method: Method) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label,
            sub_label: sub_label.into(),
            confidence,
            method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "NEFT")]
    Neft,
    #[serde(rename = "RTGS")]
    Rtgs,
    #[serde(rename = "IMPS")]
    Imps,
    Card,
    Wallet,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upi => "UPI",
            Self::Neft => "NEFT",
            Self::Rtgs => "RTGS",
            Self::Imps => "IMPS",
            Self::Card => "Card",
            Self::Wallet => "Wallet",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Transfer,
    Utility,
    Recharge,
    Emi,
    Shopping,
    Salary,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Utility => "utility",
            Self::Recharge => "recharge",
            Self::Emi => "emi",
            Self::Shopping => "shopping",
            Self::Salary => "salary",
            Self::Other => "other",
        }
    }
}

/// Structured record emitted for a financial transaction message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sms_id: String,
    pub sender: String,
    pub receiver: String,
    /// Always strictly positive.
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub payment_method: PaymentMethod,
    pub bank_name: String,
    pub account_number: Option<String>,
    pub counterparty: Option<String>,
    pub reference_number: Option<String>,
    pub transaction_date: NaiveDate,
    pub category: Category,
    #[serde(default)]
    pub category_edited: bool,
    pub description: String,
    #[serde(default)]
    pub is_spam: bool,
    #[serde(default)]
    pub anomaly_score: f64,
    #[serde(default)]
    pub is_anomaly: bool,
}
