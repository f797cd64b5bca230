pub mod boosting;
pub mod ensemble;
pub mod forest;
pub mod linear;
pub mod registry;
pub mod tfidf;
pub mod tree;

pub use ensemble::{LabeledExample, ModelMetrics, ModelSnapshot};
pub use registry::ModelRegistry;

use crate::sms::{patterns, FeatureVector, Label, LabelResult};

/// Replace a low-confidence rule result with the ensemble's prediction.
///
/// Rule results at or above `threshold` are returned untouched, as is
/// everything when no model is loaded. When the ensemble agrees with the
/// rule label the rule's sub-label is kept. A switch to a transaction label
/// takes its credit/debit sub-label from the text.
pub fn refine(
    rule: LabelResult,
    text: &str,
    features: &FeatureVector,
    model: Option<&ModelSnapshot>,
    threshold: f64,
) -> LabelResult {
    if rule.confidence >= threshold {
        return rule;
    }
    let Some(model) = model else {
        return rule;
    };

    let mut predicted = model.predict(text, features);
    if predicted.label == rule.label {
        predicted.sub_label = rule.sub_label;
    } else if predicted.label == Label::FinancialTransaction {
        predicted.sub_label = patterns::direction(text)
            .map(|d| d.as_str())
            .unwrap_or(Label::FinancialTransaction.default_sub_label())
            .to_string();
    }
    tracing::debug!(
        label = predicted.label.as_str(),
        confidence = predicted.confidence,
        "Rule confidence below threshold, used ensemble"
    );
    predicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ensemble::tests::{corpus, example, small_config};
    use crate::sms::Method;

    #[test]
    fn test_confident_rule_is_kept() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        let rule = LabelResult::new(Label::Otp, "verification", 0.95, Method::RuleBased);
        let sample = example("Your OTP is 123456", "AD-HDFCBK", Label::Otp);

        let out = refine(rule.clone(), &sample.text, &sample.features, Some(&model), 0.65);
        assert_eq!(out, rule);
    }

    #[test]
    fn test_no_model_keeps_rule() {
        let rule = LabelResult::new(Label::Personal, "unclassified", 0.30, Method::RuleBased);
        let sample = example("ok see you", "+919812345678", Label::Personal);

        let out = refine(rule.clone(), &sample.text, &sample.features, None, 0.65);
        assert_eq!(out, rule);
    }

    #[test]
    fn test_low_confidence_uses_ensemble() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        let rule = LabelResult::new(Label::Personal, "unclassified", 0.30, Method::RuleBased);
        let sample = example("Your OTP for login is 551234. Do not share it with anyone", "AD-HDFCBK", Label::Otp);

        let out = refine(rule, &sample.text, &sample.features, Some(&model), 0.65);
        assert_eq!(out.method, Method::MlEnsemble);
        assert_eq!(out.label, Label::Otp);
        assert_eq!(out.sub_label, "verification");
    }

    #[test]
    fn test_agreeing_label_keeps_rule_sub_label() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        let rule = LabelResult::new(Label::Otp, "login_otp", 0.50, Method::RuleBased);
        let sample = example("Your OTP for login is 551234. Do not share it with anyone", "AD-HDFCBK", Label::Otp);

        let out = refine(rule, &sample.text, &sample.features, Some(&model), 0.65);
        assert_eq!(out.label, Label::Otp);
        assert_eq!(out.sub_label, "login_otp");
        assert_eq!(out.method, Method::MlEnsemble);
    }

    #[test]
    fn test_switch_to_transaction_takes_direction_from_text() {
        let model = ModelSnapshot::train(&corpus(), &small_config()).unwrap();
        let rule = LabelResult::new(Label::Personal, "p2p_message", 0.30, Method::RuleBased);

        let credit = example("Rs.742 credited to your A/c X2040 via UPI Ref 559911", "VM-SBIINB", Label::FinancialTransaction);
        let out = refine(rule.clone(), &credit.text, &credit.features, Some(&model), 0.65);
        assert_eq!(out.label, Label::FinancialTransaction);
        assert_eq!(out.sub_label, "credit");

        let debit = example("Rs.742 debited from your A/c X2040 via UPI Ref 559911", "VM-SBIINB", Label::FinancialTransaction);
        let out = refine(rule, &debit.text, &debit.features, Some(&model), 0.65);
        assert_eq!(out.label, Label::FinancialTransaction);
        assert_eq!(out.sub_label, "debit");
    }
}
