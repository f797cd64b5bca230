use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::sms::{Category, PaymentMethod};

use super::period::Period;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_transactions: usize,
    pub total_credits: usize,
    pub total_debits: usize,
    pub total_credit_amount: BigDecimal,
    pub total_debit_amount: BigDecimal,
    pub net_flow: BigDecimal,
    pub avg_credit: BigDecimal,
    pub avg_debit: BigDecimal,
    pub largest_credit: BigDecimal,
    pub largest_debit: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period: String,
    pub credit_amount: BigDecimal,
    pub debit_amount: BigDecimal,
    pub net_flow: BigDecimal,
    pub credit_count: usize,
    pub debit_count: usize,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryBucket {
    pub count: usize,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodBucket {
    pub payment_method: PaymentMethod,
    pub count: usize,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankBucket {
    pub bank_name: String,
    pub count: usize,
    pub credit: BigDecimal,
    pub debit: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantBucket {
    pub name: String,
    pub count: usize,
    pub total_amount: BigDecimal,
}

/// Everything computed for one transaction set and period granularity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub period: Period,
    pub summary: AnalyticsSummary,
    /// Chronological.
    pub period_breakdown: Vec<PeriodBucket>,
    pub category_breakdown: BTreeMap<Category, CategoryBucket>,
    /// Largest amount first.
    pub payment_methods: Vec<MethodBucket>,
    /// Most transactions first.
    pub bank_breakdown: Vec<BankBucket>,
    /// Debit counterparties by total spend, at most ten.
    pub top_merchants: Vec<MerchantBucket>,
}
