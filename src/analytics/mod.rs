pub mod period;
pub mod types;

pub use period::{Period, PeriodKey};
pub use types::{
    AnalyticsReport, AnalyticsSummary, BankBucket, CategoryBucket, MerchantBucket, MethodBucket,
    PeriodBucket,
};

use bigdecimal::{BigDecimal, RoundingMode};
use std::collections::{BTreeMap, HashMap};

use crate::sms::{Category, PaymentMethod, Transaction, TransactionType};

const TOP_MERCHANTS: usize = 10;

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

fn average(total: &BigDecimal, count: usize) -> BigDecimal {
    if count == 0 {
        return zero();
    }
    (total.clone() / BigDecimal::from(count as u64)).with_scale_round(2, RoundingMode::HalfUp)
}

#[derive(Default)]
struct Flow {
    credit: BigDecimal,
    debit: BigDecimal,
    credit_count: usize,
    debit_count: usize,
}

impl Flow {
    fn add(&mut self, txn: &Transaction) {
        match txn.transaction_type {
            TransactionType::Credit => {
                self.credit += &txn.amount;
                self.credit_count += 1;
            }
            TransactionType::Debit => {
                self.debit += &txn.amount;
                self.debit_count += 1;
            }
        }
    }
}

/// Stateless aggregation over a transaction set.
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn compute(transactions: &[Transaction], period: Period) -> AnalyticsReport {
        AnalyticsReport {
            period,
            summary: summarize(transactions),
            period_breakdown: period_breakdown(transactions, period),
            category_breakdown: category_breakdown(transactions),
            payment_methods: method_breakdown(transactions),
            bank_breakdown: bank_breakdown(transactions),
            top_merchants: top_merchants(transactions, TOP_MERCHANTS),
        }
    }
}

pub fn summarize(transactions: &[Transaction]) -> AnalyticsSummary {
    let mut flow = Flow::default();
    let mut largest_credit = zero();
    let mut largest_debit = zero();
    for txn in transactions {
        flow.add(txn);
        let largest = match txn.transaction_type {
            TransactionType::Credit => &mut largest_credit,
            TransactionType::Debit => &mut largest_debit,
        };
        if txn.amount > *largest {
            *largest = txn.amount.clone();
        }
    }

    AnalyticsSummary {
        total_transactions: transactions.len(),
        total_credits: flow.credit_count,
        total_debits: flow.debit_count,
        net_flow: &flow.credit - &flow.debit,
        avg_credit: average(&flow.credit, flow.credit_count),
        avg_debit: average(&flow.debit, flow.debit_count),
        total_credit_amount: flow.credit,
        total_debit_amount: flow.debit,
        largest_credit,
        largest_debit,
    }
}

pub fn period_breakdown(transactions: &[Transaction], period: Period) -> Vec<PeriodBucket> {
    let mut groups: BTreeMap<PeriodKey, Flow> = BTreeMap::new();
    for txn in transactions {
        groups
            .entry(PeriodKey::of(txn.transaction_date, period))
            .or_default()
            .add(txn);
    }

    groups
        .into_iter()
        .map(|(key, flow)| PeriodBucket {
            period: key.to_string(),
            net_flow: &flow.credit - &flow.debit,
            credit_amount: flow.credit,
            debit_amount: flow.debit,
            credit_count: flow.credit_count,
            debit_count: flow.debit_count,
            transaction_count: flow.credit_count + flow.debit_count,
        })
        .collect()
}

pub fn category_breakdown(transactions: &[Transaction]) -> BTreeMap<Category, CategoryBucket> {
    let mut out: BTreeMap<_, CategoryBucket> = BTreeMap::new();
    for txn in transactions {
        let bucket = out.entry(txn.category).or_default();
        bucket.count += 1;
        bucket.amount += &txn.amount;
    }
    out
}

pub fn method_breakdown(transactions: &[Transaction]) -> Vec<MethodBucket> {
    let mut methods: HashMap<PaymentMethod, (usize, BigDecimal)> = HashMap::new();
    for txn in transactions {
        let entry = methods.entry(txn.payment_method).or_insert_with(|| (0, zero()));
        entry.0 += 1;
        entry.1 += &txn.amount;
    }

    let mut out: Vec<MethodBucket> = methods
        .into_iter()
        .map(|(payment_method, (count, amount))| MethodBucket {
            payment_method,
            count,
            amount,
        })
        .collect();
    out.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.payment_method.as_str().cmp(b.payment_method.as_str()))
    });
    out
}

pub fn bank_breakdown(transactions: &[Transaction]) -> Vec<BankBucket> {
    let mut banks: HashMap<&str, Flow> = HashMap::new();
    for txn in transactions {
        let name = if txn.bank_name.trim().is_empty() {
            "Unknown"
        } else {
            txn.bank_name.as_str()
        };
        banks.entry(name).or_default().add(txn);
    }

    let mut out: Vec<BankBucket> = banks
        .into_iter()
        .map(|(name, flow)| BankBucket {
            bank_name: name.to_string(),
            count: flow.credit_count + flow.debit_count,
            credit: flow.credit,
            debit: flow.debit,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.bank_name.cmp(&b.bank_name)));
    out
}

pub fn top_merchants(transactions: &[Transaction], limit: usize) -> Vec<MerchantBucket> {
    let mut merchants: HashMap<&str, (usize, BigDecimal)> = HashMap::new();
    for txn in transactions.iter().filter(|t| t.transaction_type == TransactionType::Debit) {
        let name = txn.counterparty.as_deref().unwrap_or("Unknown");
        let entry = merchants.entry(name).or_insert_with(|| (0, zero()));
        entry.0 += 1;
        entry.1 += &txn.amount;
    }

    let mut out: Vec<MerchantBucket> = merchants
        .into_iter()
        .map(|(name, (count, total_amount))| MerchantBucket {
            name: name.to_string(),
            count,
            total_amount,
        })
        .collect();
    out.sort_by(|a, b| b.total_amount.cmp(&a.total_amount).then_with(|| a.name.cmp(&b.name)));
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn txn(
        id: u32,
        kind: TransactionType,
        amount: &str,
        date: (i32, u32, u32),
        counterparty: &str,
        method: PaymentMethod,
        category: Category,
    ) -> Transaction {
        Transaction {
            sms_id: id.to_string(),
            sender: "VM-SBIINB".to_string(),
            receiver: "Unknown".to_string(),
            amount: BigDecimal::from_str(amount).unwrap(),
            transaction_type: kind,
            payment_method: method,
            bank_name: if id % 2 == 0 { "State Bank of India" } else { "HDFC Bank" }.to_string(),
            account_number: None,
            counterparty: Some(counterparty.to_string()),
            reference_number: None,
            transaction_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            category,
            category_edited: false,
            description: String::new(),
            is_spam: false,
            anomaly_score: 0.0,
            is_anomaly: false,
        }
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn sample() -> Vec<Transaction> {
        use Category::*;
        use PaymentMethod::*;
        use TransactionType::*;
        vec![
            txn(1, Credit, "50000", (2025, 3, 1), "ACME PAYROLL", Neft, Salary),
            txn(2, Debit, "1200.50", (2025, 3, 5), "Swiggy", Upi, Shopping),
            txn(3, Debit, "499", (2025, 1, 15), "Jio", Upi, Recharge),
            txn(4, Debit, "800.25", (2025, 3, 20), "Swiggy", Card, Shopping),
            txn(5, Credit, "1000.10", (2025, 4, 2), "SUBHASH BOKADE", Upi, Transfer),
            txn(6, Debit, "15000", (2025, 4, 5), "HDFC EMI", PaymentMethod::Other, Emi),
        ]
    }

    #[test]
    fn test_summary() {
        let s = summarize(&sample());
        assert_eq!(s.total_transactions, 6);
        assert_eq!(s.total_credits, 2);
        assert_eq!(s.total_debits, 4);
        assert_eq!(s.total_credit_amount, dec("51000.10"));
        assert_eq!(s.total_debit_amount, dec("17499.75"));
        assert_eq!(s.net_flow, dec("33500.35"));
        assert_eq!(s.avg_credit, dec("25500.05"));
        assert_eq!(s.avg_debit, dec("4374.94"));
        assert_eq!(s.largest_credit, dec("50000"));
        assert_eq!(s.largest_debit, dec("15000"));
    }

    #[test]
    fn test_net_flow_reconciles_everywhere() {
        let txns = sample();
        for period in [Period::Weekly, Period::Monthly, Period::Quarterly, Period::Yearly] {
            let report = AnalyticsEngine::compute(&txns, period);
            assert_eq!(
                report.summary.net_flow,
                &report.summary.total_credit_amount - &report.summary.total_debit_amount
            );
            let mut counted = 0;
            for bucket in &report.period_breakdown {
                assert_eq!(bucket.net_flow, &bucket.credit_amount - &bucket.debit_amount);
                counted += bucket.transaction_count;
            }
            assert_eq!(counted, txns.len());
        }
    }

    #[test]
    fn test_buckets_are_chronological_regardless_of_input_order() {
        let mut txns = sample();
        txns.reverse();
        let report = AnalyticsEngine::compute(&txns, Period::Monthly);
        let keys: Vec<&str> = report.period_breakdown.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(keys, vec!["2025-01", "2025-03", "2025-04"]);

        let quarterly = AnalyticsEngine::compute(&txns, Period::Quarterly);
        let keys: Vec<&str> = quarterly.period_breakdown.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(keys, vec!["2025-Q1", "2025-Q2"]);
        assert_eq!(quarterly.period_breakdown[0].transaction_count, 4);
    }

    #[test]
    fn test_same_date_same_bucket() {
        let a = txn(1, TransactionType::Debit, "10", (2025, 6, 9), "x", PaymentMethod::Upi, Category::Other);
        let b = txn(2, TransactionType::Credit, "20", (2025, 6, 9), "y", PaymentMethod::Upi, Category::Other);
        let report = AnalyticsEngine::compute(&[a, b], Period::Weekly);
        assert_eq!(report.period_breakdown.len(), 1);
        assert_eq!(report.period_breakdown[0].period, "2025-W24");
        assert_eq!(report.period_breakdown[0].net_flow, dec("10"));
    }

    #[test]
    fn test_category_and_breakdowns() {
        let report = AnalyticsEngine::compute(&sample(), Period::Monthly);

        let shopping = &report.category_breakdown[&Category::Shopping];
        assert_eq!(shopping.count, 2);
        assert_eq!(shopping.amount, dec("2000.75"));

        assert_eq!(report.payment_methods[0].payment_method, PaymentMethod::Neft);
        let upi = report
            .payment_methods
            .iter()
            .find(|m| m.payment_method == PaymentMethod::Upi)
            .unwrap();
        assert_eq!(upi.count, 3);
        assert_eq!(upi.amount, dec("2699.60"));

        assert_eq!(report.bank_breakdown.len(), 2);
        assert_eq!(report.bank_breakdown[0].bank_name, "HDFC Bank");
        assert_eq!(report.bank_breakdown[0].count, 3);

        assert_eq!(report.top_merchants[0].name, "HDFC EMI");
        assert_eq!(report.top_merchants[1].name, "Swiggy");
        assert_eq!(report.top_merchants[1].count, 2);
        assert_eq!(report.top_merchants[1].total_amount, dec("2000.75"));
        assert!(report.top_merchants.iter().all(|m| m.name != "ACME PAYROLL"));
    }

    #[test]
    fn test_top_merchants_limit() {
        let txns: Vec<Transaction> = (0..15)
            .map(|i| {
                txn(
                    i,
                    TransactionType::Debit,
                    &format!("{}", 100 + i),
                    (2025, 1, 1),
                    &format!("m{}", i),
                    PaymentMethod::Upi,
                    Category::Other,
                )
            })
            .collect();
        let top = top_merchants(&txns, TOP_MERCHANTS);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].name, "m14");
    }

    #[test]
    fn test_scenario_empty_input() {
        let report = AnalyticsEngine::compute(&[], Period::Monthly);
        assert_eq!(report.summary, AnalyticsSummary::default());
        assert_eq!(report.summary.net_flow, zero());
        assert!(report.period_breakdown.is_empty());
        assert!(report.category_breakdown.is_empty());
        assert!(report.payment_methods.is_empty());
        assert!(report.bank_breakdown.is_empty());
        assert!(report.top_merchants.is_empty());
    }
}
