use serde::Serialize;

/// Families of scam messages the spam check recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamType {
    LotteryScam,
    FakeBankAlert,
    LoanScam,
    PhishingUrl,
    OtpTheft,
    Custom,
}

impl SpamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LotteryScam => "lottery_scam",
            Self::FakeBankAlert => "fake_bank_alert",
            Self::LoanScam => "loan_scam",
            Self::PhishingUrl => "phishing_url",
            Self::OtpTheft => "otp_theft",
            Self::Custom => "custom",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::LotteryScam => "Contains lottery/prize scam language",
            Self::FakeBankAlert => "Contains fake bank alert / KYC scam language",
            Self::LoanScam => "Contains suspicious loan offer",
            Self::PhishingUrl => "Contains shortened/suspicious URL",
            Self::OtpTheft => "Attempting OTP theft",
            Self::Custom => "Matches a configured spam pattern",
        }
    }
}

/// Result of the spam check for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpamVerdict {
    pub is_spam: bool,
    pub spam_type: Option<SpamType>,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Anomaly annotation for one emitted transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub score: f64,
    pub is_anomaly: bool,
}
