use crate::sms::{Feature, FeatureVector, Label, LabelResult, Method};

use super::rules::{Rule, RuleContext, DEFAULT_RULES};

/// Confidence floor for a bank-sent message that quotes an amount.
const CORROBORATED_CONFIDENCE: f64 = 0.90;
const FALLBACK_CONFIDENCE: f64 = 0.30;

/// Ordered rule table, first match wins.
pub struct Labeler {
    rules: Vec<Rule>,
}

impl Default for Labeler {
    fn default() -> Self {
        Self::new()
    }
}

impl Labeler {
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn label(&self, text: &str, sender: &str, features: &FeatureVector) -> LabelResult {
        self.label_with_rule(text, sender, features).0
    }

    /// Like [`Labeler::label`] but also reports which rule decided.
    pub fn label_with_rule(
        &self,
        text: &str,
        sender: &str,
        features: &FeatureVector,
    ) -> (LabelResult, &'static str) {
        let ctx = RuleContext::new(text, sender, features);

        for rule in &self.rules {
            if let Some(mut result) = (rule.check)(&ctx) {
                if result.label == Label::FinancialTransaction
                    && features.flag(Feature::IsBankSender)
                    && features.flag(Feature::HasAmount)
                {
                    result.confidence = result.confidence.max(CORROBORATED_CONFIDENCE);
                }
                tracing::trace!(
                    rule = rule.name,
                    label = result.label.as_str(),
                    confidence = result.confidence,
                    "Rule matched"
                );
                return (result, rule.name);
            }
        }

        (
            LabelResult::new(Label::Personal, "unclassified", FALLBACK_CONFIDENCE, Method::RuleBased),
            "fallback",
        )
    }
}
