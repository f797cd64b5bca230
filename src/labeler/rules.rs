use regex::Regex;
use std::sync::OnceLock;

use crate::sms::patterns;
use crate::sms::{Feature, FeatureVector, Label, LabelResult, Method, TransactionType};

/// Precomputed signals every rule reads from.
pub struct RuleContext<'a> {
    pub text: &'a str,
    pub lower: String,
    pub sender: &'a str,
    pub features: &'a FeatureVector,
    /// Polarity of the earliest money-movement word.
    pub direction: Option<TransactionType>,
    pub non_transaction: bool,
    pub promotional: bool,
    pub transaction_verb: bool,
}

impl<'a> RuleContext<'a> {
    pub fn new(text: &'a str, sender: &'a str, features: &'a FeatureVector) -> Self {
        Self {
            text,
            lower: text.to_lowercase(),
            sender: sender.trim(),
            features,
            direction: patterns::direction(text),
            non_transaction: patterns::non_transaction_re().is_match(text),
            promotional: patterns::promo_re().is_match(text),
            transaction_verb: patterns::transaction_verb_re().is_match(text),
        }
    }

    fn has(&self, feature: Feature) -> bool {
        self.features.flag(feature)
    }

    /// Weighted evidence that money moved.
    pub fn transaction_score(&self) -> f64 {
        let mut score = 0.0;
        if self.has(Feature::HasAmount) {
            score += 0.25;
        }
        if self.has(Feature::HasAccount) {
            score += 0.20;
        }
        if self.has(Feature::HasCreditWord) || self.has(Feature::HasDebitWord) {
            score += 0.30;
        }
        if self.has(Feature::IsBankSender) {
            score += 0.15;
        }
        if self.has(Feature::HasUpi) || self.has(Feature::HasNeft) || self.has(Feature::HasImps) {
            score += 0.10;
        }
        score
    }

    /// Weighted evidence of a bank notice that moved no money.
    pub fn alert_score(&self) -> f64 {
        let mut score = 0.0;
        if self.has(Feature::IsBankSender) {
            score += 0.30;
        }
        if self.has(Feature::HasAmount) {
            score += 0.15;
        }
        if self.has(Feature::HasBalance) {
            score += 0.20;
        }
        if self.non_transaction {
            score += 0.25;
        }
        if self.has(Feature::HasAccount) {
            score += 0.10;
        }
        score
    }

    fn alert_sub_label(&self) -> &'static str {
        let words = |w: &str| {
            self.lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == w)
        };
        if self.lower.contains("statement") {
            "statement"
        } else if words("emi") || self.lower.contains("payment due") || self.lower.contains("overdue")
        {
            "payment_reminder"
        } else if self.has(Feature::HasBalance) {
            "balance_info"
        } else if self.lower.contains("block") || self.lower.contains("suspend") {
            "security_alert"
        } else {
            "general_alert"
        }
    }
}

fn direction_label(direction: Option<TransactionType>) -> &'static str {
    direction
        .map(|d| d.as_str())
        .unwrap_or(Label::FinancialTransaction.default_sub_label())
}

fn rule_result(label: Label, sub_label: &str, confidence: f64) -> Option<LabelResult> {
    Some(LabelResult::new(label, sub_label, confidence, Method::RuleBased))
}

/// "A/c X1230-credited by Rs.1000" or "Rs 500 debited from".
fn bank_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\ba/?c\b|\baccount\b|\bacct\b|\bcard\b).{0,40}?\b(credited|debited)\b\s*(?:by|for|with|of)?\s*(?:Rs\.?|INR|₹)\s*\d|(?:\bRs\.?|\bINR|₹)\s*[\d,]*\d(?:\.\d{1,2})?\s+(?:has\s+been\s+|is\s+|was\s+)?(credited|debited)\b",
        )
        .expect("invalid bank template regex")
    })
}

/// "paid Rs 250 to X via UPI", "spent on your HDFC Card".
fn payment_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(paid|sent|received|spent|debited|credited)\b.{0,60}?\b(?:via|using|through|thru|on|from|to|by)\b.{0,40}?\b(?:UPI|IMPS|NEFT|RTGS|VPA|card)\b",
        )
        .expect("invalid payment template regex")
    })
}

fn verb_direction(verb: &str) -> TransactionType {
    match verb.to_lowercase().as_str() {
        "received" | "credited" => TransactionType::Credit,
        _ => TransactionType::Debit,
    }
}

// ============================================================
// Rule checks, in evaluation order
// ============================================================

pub fn check_spam_phrasing(ctx: &RuleContext) -> Option<LabelResult> {
    if patterns::spam_phrase_re().is_match(ctx.text) {
        return rule_result(Label::Spam, "phishing", 0.90);
    }
    None
}

pub fn check_otp(ctx: &RuleContext) -> Option<LabelResult> {
    if !ctx.has(Feature::HasOtp) {
        return None;
    }
    // Transaction OTPs ("OTP for Rs 500 debit") fall through to the transaction rules.
    if ctx.has(Feature::HasAmount) && ctx.direction.is_some() {
        return None;
    }
    rule_result(Label::Otp, "verification", 0.95)
}

pub fn check_bank_template(ctx: &RuleContext) -> Option<LabelResult> {
    if ctx.non_transaction {
        return None;
    }
    let caps = bank_template_re().captures(ctx.text)?;
    let verb = caps.get(1).or_else(|| caps.get(2))?;
    let direction = verb_direction(verb.as_str());
    rule_result(Label::FinancialTransaction, direction.as_str(), 0.88)
}

pub fn check_payment_template(ctx: &RuleContext) -> Option<LabelResult> {
    if ctx.non_transaction || !ctx.has(Feature::HasAmount) {
        return None;
    }
    let caps = payment_template_re().captures(ctx.text)?;
    let direction = verb_direction(caps.get(1)?.as_str());
    rule_result(Label::FinancialTransaction, direction.as_str(), 0.85)
}

pub fn check_financial_alert(ctx: &RuleContext) -> Option<LabelResult> {
    let score = ctx.alert_score();
    if ctx.non_transaction && score >= 0.40 {
        return rule_result(Label::FinancialAlert, ctx.alert_sub_label(), score + 0.10);
    }
    None
}

/// Offers that quote an amount but never say money moved.
pub fn check_promotional_offer(ctx: &RuleContext) -> Option<LabelResult> {
    if ctx.promotional && !ctx.transaction_verb {
        return rule_result(Label::Promotional, "marketing", 0.80);
    }
    None
}

pub fn check_scored_transaction(ctx: &RuleContext) -> Option<LabelResult> {
    let score = ctx.transaction_score();
    if score >= 0.50 && !ctx.non_transaction {
        return rule_result(
            Label::FinancialTransaction,
            direction_label(ctx.direction),
            score + 0.10,
        );
    }
    None
}

pub fn check_scored_alert(ctx: &RuleContext) -> Option<LabelResult> {
    let score = ctx.alert_score();
    if score >= 0.40 {
        return rule_result(Label::FinancialAlert, ctx.alert_sub_label(), score + 0.10);
    }
    None
}

pub fn check_promotional(ctx: &RuleContext) -> Option<LabelResult> {
    if ctx.promotional {
        return rule_result(Label::Promotional, "marketing", 0.80);
    }
    None
}

pub fn check_personal_sender(ctx: &RuleContext) -> Option<LabelResult> {
    if patterns::phone_sender_re().is_match(ctx.sender) {
        return rule_result(Label::Personal, "p2p_message", 0.70);
    }
    None
}

/// Alphanumeric headers that are not people are business traffic.
pub fn check_informational(ctx: &RuleContext) -> Option<LabelResult> {
    let sender = ctx.sender;
    let header_like = patterns::shortcode_sender_re().is_match(sender)
        || (sender.len() >= 3
            && sender.len() <= 11
            && sender.chars().all(|c| c.is_ascii_alphanumeric())
            && sender.chars().any(|c| c.is_ascii_alphabetic()));
    if header_like && !ctx.text.is_empty() {
        return rule_result(Label::Promotional, "informational", 0.60);
    }
    None
}

pub type RuleCheck = fn(&RuleContext) -> Option<LabelResult>;

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub check: RuleCheck,
}

/// Default ordering: specific templates before scored matches before catch-alls.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule { name: "spam_phrasing", check: check_spam_phrasing },
    Rule { name: "otp", check: check_otp },
    Rule { name: "bank_template", check: check_bank_template },
    Rule { name: "payment_template", check: check_payment_template },
    Rule { name: "financial_alert", check: check_financial_alert },
    Rule { name: "promotional_offer", check: check_promotional_offer },
    Rule { name: "scored_transaction", check: check_scored_transaction },
    Rule { name: "scored_alert", check: check_scored_alert },
    Rule { name: "promotional", check: check_promotional },
    Rule { name: "personal_sender", check: check_personal_sender },
    Rule { name: "informational", check: check_informational },
];
