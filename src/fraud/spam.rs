use regex::Regex;
use std::sync::OnceLock;

use crate::config::SpamConfig;
use crate::sms::patterns::{phone_sender_re, shortcode_sender_re};

use super::types::{SpamType, SpamVerdict};

const PATTERN_WEIGHT: f64 = 0.30;
const SENDER_WEIGHT: f64 = 0.15;
const URL_WEIGHT: f64 = 0.20;
pub const SPAM_THRESHOLD: f64 = 0.30;

const BUILTIN_PATTERNS: &[(&str, SpamType)] = &[
    (r"(?i)congratulations.*(?:won|winner|prize|crore|lakh)", SpamType::LotteryScam),
    (r"(?i)lucky\s*(?:draw|winner|customer)", SpamType::LotteryScam),
    (r"(?i)(?:won|win)\s*(?:Rs\.?|INR|₹)?\s*[\d,]+\s*(?:crore|lakh)", SpamType::LotteryScam),
    (r"(?i)(?:kyc|pan|aadhar|aadhaar)\s*(?:expired?|expir|update|link|verify|suspend)", SpamType::FakeBankAlert),
    (r"(?i)(?:account|a/c)\s*(?:will\s*be\s*)?(?:block|suspend|close|deactivat)", SpamType::FakeBankAlert),
    (r"(?i)click\s*(?:here|below|link).*(?:verify|update|kyc|pan|aadhar)", SpamType::FakeBankAlert),
    (r"(?i)(?:instant|quick|fast)\s*(?:loan|cash)\s*(?:approved|available)", SpamType::LoanScam),
    (r"(?i)pre.?approved\s*(?:loan|credit)\s*(?:of|upto|up\s*to)\s*(?:Rs|INR)", SpamType::LoanScam),
    (r"(?i)(?:bit\.ly|tinyurl|goo\.gl|rb\.gy|is\.gd)/", SpamType::PhishingUrl),
    (r"(?i)share\s*(?:your\s*)?otp.*to\s*(?:verify|confirm|complete)", SpamType::OtpTheft),
    (r"(?i)(?:call|contact)\s*(?:us|customer).*(?:otp|password)", SpamType::OtpTheft),
];

const KNOWN_DOMAINS: &[&str] = &[
    "sbicard.com",
    "onlinesbi.com",
    "hdfcbank.com",
    "icicibank.com",
    "axisbank.com",
    "kotak.com",
    "bobfinancial.com",
    "pnbindia.in",
    "unionbankofindia.co.in",
    "canarabank.com",
    "ippbonline.com",
    "idbidirect.in",
    "federalbank.co.in",
    "yesbank.in",
    "rblbank.com",
    "paytm.com",
    "phonepe.com",
    "airtel.in",
    "jio.com",
];

const FINANCIAL_WORDS: &[&str] = &["bank", "account", "card", "upi"];
const URGENCY_WORDS: &[&str] = &["click", "verify", "update", "kyc"];

fn builtin() -> &'static [(Regex, SpamType)] {
    static PATTERNS: OnceLock<Vec<(Regex, SpamType)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BUILTIN_PATTERNS
            .iter()
            .map(|(p, t)| (Regex::new(p).expect("invalid spam pattern"), *t))
            .collect()
    })
}

fn url_host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://([^\s/]+)").expect("invalid url host regex"))
}

/// Pattern-based scam screen. Works on the raw body so links are still visible.
pub struct SpamChecker {
    extra: Vec<Regex>,
}

impl SpamChecker {
    /// Compile configured extra patterns. A bad pattern is a startup error.
    pub fn new(config: &SpamConfig) -> eyre::Result<Self> {
        let extra = config
            .extra_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| eyre::eyre!("Invalid spam pattern '{}': {}", p, e)))
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self { extra })
    }

    pub fn pattern_count(&self) -> usize {
        BUILTIN_PATTERNS.len() + self.extra.len()
    }

    pub fn check(&self, body: &str, sender: &str) -> SpamVerdict {
        let mut confidence = 0.0;
        let mut spam_type = None;
        let mut reasons: Vec<String> = Vec::new();
        let mut matched = false;

        let patterns = builtin().iter().map(|(re, t)| (re, *t));
        let extra = self.extra.iter().map(|re| (re, SpamType::Custom));
        for (re, kind) in patterns.chain(extra) {
            if re.is_match(body) {
                matched = true;
                confidence += PATTERN_WEIGHT;
                spam_type = Some(kind);
                reasons.push(kind.reason().to_string());
            }
        }

        let lower = body.to_lowercase();
        let standard_sender = shortcode_sender_re().is_match(sender) || phone_sender_re().is_match(sender);
        if !standard_sender && FINANCIAL_WORDS.iter().any(|w| lower.contains(w)) {
            confidence += SENDER_WEIGHT;
            reasons.push("Non-standard sender claiming financial content".to_string());
        }

        let urgent = URGENCY_WORDS.iter().any(|w| lower.contains(w));
        for caps in url_host_re().captures_iter(body) {
            let host = caps[1].to_lowercase();
            if urgent && !KNOWN_DOMAINS.iter().any(|d| host.contains(d)) {
                confidence += URL_WEIGHT;
                reasons.push(format!("Unknown URL ({}) with urgency language", host));
            }
        }

        let is_spam = matched || confidence >= SPAM_THRESHOLD;
        if !is_spam {
            return SpamVerdict {
                confidence: round3(confidence.min(1.0)),
                ..SpamVerdict::default()
            };
        }
        SpamVerdict {
            is_spam,
            spam_type,
            confidence: round3(confidence.min(1.0)),
            reasons,
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
