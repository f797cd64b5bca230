use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use super::patterns;
use super::types::RawMessage;

/// Hand-crafted features in their fixed model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BodyLength,
    WordCount,
    HasUrl,
    HasPhoneNumber,
    HasAmount,
    HasAccount,
    HasCreditWord,
    HasDebitWord,
    HasBalance,
    HasUpi,
    HasNeft,
    HasImps,
    HasRtgs,
    HasCard,
    HasWallet,
    IsBankSender,
    IsShortcodeSender,
    IsPhoneSender,
    HasOtp,
    FinancialKeywordCount,
    MentionsSbi,
    MentionsHdfc,
    MentionsIcici,
    MentionsAxis,
    MentionsKotak,
}

pub const FEATURE_COUNT: usize = 25;

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::BodyLength,
        Feature::WordCount,
        Feature::HasUrl,
        Feature::HasPhoneNumber,
        Feature::HasAmount,
        Feature::HasAccount,
        Feature::HasCreditWord,
        Feature::HasDebitWord,
        Feature::HasBalance,
        Feature::HasUpi,
        Feature::HasNeft,
        Feature::HasImps,
        Feature::HasRtgs,
        Feature::HasCard,
        Feature::HasWallet,
        Feature::IsBankSender,
        Feature::IsShortcodeSender,
        Feature::IsPhoneSender,
        Feature::HasOtp,
        Feature::FinancialKeywordCount,
        Feature::MentionsSbi,
        Feature::MentionsHdfc,
        Feature::MentionsIcici,
        Feature::MentionsAxis,
        Feature::MentionsKotak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BodyLength => "body_length",
            Self::WordCount => "word_count",
            Self::HasUrl => "has_url",
            Self::HasPhoneNumber => "has_phone_number",
            Self::HasAmount => "has_amount",
            Self::HasAccount => "has_account",
            Self::HasCreditWord => "has_credit_word",
            Self::HasDebitWord => "has_debit_word",
            Self::HasBalance => "has_balance",
            Self::HasUpi => "has_upi",
            Self::HasNeft => "has_neft",
            Self::HasImps => "has_imps",
            Self::HasRtgs => "has_rtgs",
            Self::HasCard => "has_card",
            Self::HasWallet => "has_wallet",
            Self::IsBankSender => "is_bank_sender",
            Self::IsShortcodeSender => "is_shortcode_sender",
            Self::IsPhoneSender => "is_phone_sender",
            Self::HasOtp => "has_otp",
            Self::FinancialKeywordCount => "financial_keyword_count",
            Self::MentionsSbi => "mentions_sbi",
            Self::MentionsHdfc => "mentions_hdfc",
            Self::MentionsIcici => "mentions_icici",
            Self::MentionsAxis => "mentions_axis",
            Self::MentionsKotak => "mentions_kotak",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Read-only engineered features for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn flag(&self, feature: Feature) -> bool {
        self.get(feature) > 0.0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    fn set_flag(&mut self, feature: Feature, value: bool) {
        self.set(feature, if value { 1.0 } else { 0.0 });
    }
}

const FINANCIAL_KEYWORDS: &[&str] = &[
    "rs", "inr", "credited", "debited", "a/c", "account", "balance", "transaction", "transfer",
    "payment", "upi", "neft", "imps", "card", "emi", "loan", "bank",
];

fn zero_width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{200B}-\u{200D}\u{FEFF}]").expect("invalid zero width regex"))
}

fn bank_mention_res() -> &'static [(Feature, Regex); 5] {
    static RES: OnceLock<[(Feature, Regex); 5]> = OnceLock::new();
    RES.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("invalid bank mention regex");
        [
            (Feature::MentionsSbi, re(r"(?i)\bSBI\b|state\s+bank")),
            (Feature::MentionsHdfc, re(r"(?i)\bHDFC")),
            (Feature::MentionsIcici, re(r"(?i)\bICICI")),
            (Feature::MentionsAxis, re(r"(?i)\bAXIS\b")),
            (Feature::MentionsKotak, re(r"(?i)\bKOTAK")),
        ]
    })
}

/// Strips links and invisible characters and collapses whitespace.
/// Currency symbols, digits and punctuation are kept.
pub fn clean_text(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    let without_urls = patterns::url_re().replace_all(body, " ");
    let visible = zero_width_re().replace_all(&without_urls, "");
    patterns::whitespace_re()
        .replace_all(visible.trim(), " ")
        .trim()
        .to_string()
}

pub fn extract_features(body: &str, sender: &str) -> FeatureVector {
    let mut fv = FeatureVector::default();
    if body.trim().is_empty() {
        return fv;
    }

    let cleaned = clean_text(body);
    let lower = cleaned.to_lowercase();
    let sender = sender.trim();

    fv.set(Feature::BodyLength, cleaned.chars().count() as f64);
    fv.set(Feature::WordCount, cleaned.split_whitespace().count() as f64);
    fv.set_flag(Feature::HasUrl, patterns::url_re().is_match(body));
    fv.set_flag(Feature::HasPhoneNumber, patterns::phone_number_re().is_match(body));

    fv.set_flag(Feature::HasAmount, patterns::amount_re().is_match(&cleaned));
    fv.set_flag(Feature::HasAccount, patterns::account_re().is_match(&cleaned));
    fv.set_flag(Feature::HasCreditWord, patterns::credit_re().is_match(&cleaned));
    fv.set_flag(Feature::HasDebitWord, patterns::debit_re().is_match(&cleaned));
    fv.set_flag(Feature::HasBalance, patterns::balance_re().is_match(&cleaned));

    fv.set_flag(Feature::HasUpi, patterns::upi_re().is_match(&cleaned));
    fv.set_flag(Feature::HasNeft, patterns::neft_re().is_match(&cleaned));
    fv.set_flag(Feature::HasImps, patterns::imps_re().is_match(&cleaned));
    fv.set_flag(Feature::HasRtgs, patterns::rtgs_re().is_match(&cleaned));
    fv.set_flag(Feature::HasCard, patterns::card_re().is_match(&cleaned));
    fv.set_flag(Feature::HasWallet, patterns::wallet_re().is_match(&cleaned));

    fv.set_flag(Feature::IsBankSender, patterns::bank_sender_re().is_match(sender));
    fv.set_flag(Feature::IsShortcodeSender, patterns::shortcode_sender_re().is_match(sender));
    fv.set_flag(Feature::IsPhoneSender, patterns::phone_sender_re().is_match(sender));

    fv.set_flag(Feature::HasOtp, patterns::otp_re().is_match(&cleaned));

    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ':' | ';' | '-' | '!' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();
    let keyword_hits = FINANCIAL_KEYWORDS
        .iter()
        .filter(|kw| tokens.iter().any(|t| t == *kw))
        .count();
    fv.set(Feature::FinancialKeywordCount, keyword_hits as f64);

    for (feature, re) in bank_mention_res() {
        fv.set_flag(*feature, re.is_match(&cleaned));
    }

    fv
}

/// Cleans a message and computes its feature vector. Never fails.
pub fn preprocess(msg: &RawMessage) -> (String, FeatureVector) {
    (clean_text(&msg.body), extract_features(&msg.body, &msg.sender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_urls_and_whitespace() {
        let cleaned = clean_text("You have won ₹1 crore!  Click http://bit.ly/xyz\n to claim now");
        assert_eq!(cleaned, "You have won ₹1 crore! Click to claim now");
    }

    #[test]
    fn test_clean_text_keeps_currency_and_digits() {
        assert_eq!(clean_text("Rs.1,000.50\u{200B} debited"), "Rs.1,000.50 debited");
    }

    #[test]
    fn test_empty_body_gives_zero_vector() {
        let fv = extract_features("   ", "VM-SBIINB");
        assert!(fv.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(fv.as_slice().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_bank_credit_features() {
        let msg = RawMessage::new(
            "1",
            "VM-SBIINB",
            "Dear SBI User, your A/c X1230-credited by Rs.1000 on 03Oct25 transfer from SUBHASH BOKADE Ref No 091542697620 -SBI",
            0,
        );
        let (_, fv) = preprocess(&msg);
        assert!(fv.flag(Feature::HasAmount));
        assert!(fv.flag(Feature::HasAccount));
        assert!(fv.flag(Feature::HasCreditWord));
        assert!(!fv.flag(Feature::HasDebitWord));
        assert!(fv.flag(Feature::IsBankSender));
        assert!(fv.flag(Feature::IsShortcodeSender));
        assert!(fv.flag(Feature::MentionsSbi));
        assert!(!fv.flag(Feature::MentionsHdfc));
        assert!(fv.get(Feature::FinancialKeywordCount) >= 3.0);
    }

    #[test]
    fn test_url_flag_uses_raw_body() {
        let fv = extract_features("Click http://bit.ly/xyz now", "");
        assert!(fv.flag(Feature::HasUrl));
    }
}
