use bigdecimal::ToPrimitive;
use chrono::{FixedOffset, TimeZone, Timelike};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::config::AnomalyConfig;
use crate::sms::{Transaction, TransactionType};

use super::isolation::{IsolationForest, IsolationParams};
use super::types::AnomalyVerdict;

const HOUR_MS: f64 = 3_600_000.0;

/// What the anomaly model remembers about one past transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub amount: f64,
    pub timestamp_ms: i64,
    pub hour: f64,
    pub counterparty: Option<String>,
    pub is_debit: bool,
}

impl HistoryPoint {
    pub fn from_transaction(txn: &Transaction, timestamp_ms: i64, offset: FixedOffset) -> Self {
        let hour = offset
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .map(|t| t.hour() as f64 + t.minute() as f64 / 60.0)
            .unwrap_or(0.0);
        Self {
            amount: txn.amount.to_f64().unwrap_or(0.0),
            timestamp_ms,
            hour,
            counterparty: txn.counterparty.as_ref().map(|c| c.to_lowercase()),
            is_debit: txn.transaction_type == TransactionType::Debit,
        }
    }
}

/// Rows are [amount, hour, ln(1 + gap hours to nearest neighbour),
/// counterparty share, is_debit], computed against `history`.
/// `skip` excludes the point itself when featurizing history members.
fn featurize(
    point: &HistoryPoint,
    history: &VecDeque<HistoryPoint>,
    counterparties: &HashMap<String, usize>,
    skip: Option<usize>,
) -> Vec<f64> {
    let nearest_gap = history
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .map(|(_, h)| (h.timestamp_ms - point.timestamp_ms).unsigned_abs() as f64 / HOUR_MS)
        .fold(f64::INFINITY, f64::min);
    let nearest_gap = if nearest_gap.is_finite() { nearest_gap } else { 0.0 };

    let others = history.len() - usize::from(skip.is_some());
    let seen = point
        .counterparty
        .as_ref()
        .and_then(|c| counterparties.get(c))
        .copied()
        .unwrap_or(0)
        .saturating_sub(usize::from(skip.is_some() && point.counterparty.is_some()));
    let share = if others == 0 { 0.0 } else { seen as f64 / others as f64 };

    vec![
        point.amount,
        point.hour,
        nearest_gap.ln_1p(),
        share,
        if point.is_debit { 1.0 } else { 0.0 },
    ]
}

/// Rolling per-user history plus the forest fitted on it.
#[derive(Debug, Default)]
pub struct UserBaseline {
    history: VecDeque<HistoryPoint>,
    counterparties: HashMap<String, usize>,
    forest: Option<IsolationForest>,
    dirty: bool,
}

impl UserBaseline {
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn needs_fit(&self, min_history: usize) -> bool {
        self.history.len() >= min_history && (self.dirty || self.forest.is_none())
    }

    fn fit(&mut self, params: &IsolationParams) {
        let rows: Vec<Vec<f64>> = self
            .history
            .iter()
            .enumerate()
            .map(|(i, p)| featurize(p, &self.history, &self.counterparties, Some(i)))
            .collect();
        self.forest = Some(IsolationForest::fit(&rows, params));
        self.dirty = false;
    }

    fn score(&self, point: &HistoryPoint, min_history: usize) -> f64 {
        if self.history.len() < min_history {
            return 0.0;
        }
        match &self.forest {
            Some(forest) => forest.score(&featurize(point, &self.history, &self.counterparties, None)),
            None => 0.0,
        }
    }

    fn record(&mut self, point: HistoryPoint, max_history: usize) {
        if let Some(c) = &point.counterparty {
            *self.counterparties.entry(c.clone()).or_insert(0) += 1;
        }
        self.history.push_back(point);
        while self.history.len() > max_history {
            if let Some(old) = self.history.pop_front() {
                if let Some(c) = old.counterparty {
                    if let Some(n) = self.counterparties.get_mut(&c) {
                        *n -= 1;
                        if *n == 0 {
                            self.counterparties.remove(&c);
                        }
                    }
                }
            }
        }
        self.dirty = true;
    }
}

/// Per-user baselines keyed by user id. Each baseline has its own lock:
/// refits take the write side, scoring shares the read side.
pub struct BaselineRegistry {
    config: AnomalyConfig,
    users: DashMap<String, Arc<RwLock<UserBaseline>>>,
}

impl BaselineRegistry {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            users: DashMap::new(),
        }
    }

    fn params(&self) -> IsolationParams {
        IsolationParams {
            n_trees: self.config.trees,
            sample_size: self.config.sample_size,
            seed: self.config.seed,
        }
    }

    fn baseline(&self, user_id: &str) -> Arc<RwLock<UserBaseline>> {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(UserBaseline::default())))
            .clone()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn history_len(&self, user_id: &str) -> usize {
        self.users.get(user_id).map(|b| b.read().len()).unwrap_or(0)
    }

    /// Score a batch against the user's prior history, then append it.
    /// Points in the same batch do not score against each other.
    pub fn score_and_record(&self, user_id: &str, points: Vec<HistoryPoint>) -> Vec<AnomalyVerdict> {
        if points.is_empty() {
            return Vec::new();
        }
        let baseline = self.baseline(user_id);
        let min_history = self.config.min_history;

        {
            let mut guard = baseline.write();
            if guard.needs_fit(min_history) {
                guard.fit(&self.params());
                tracing::debug!(user_id, history = guard.len(), "Refit anomaly baseline");
            }
        }

        let verdicts: Vec<AnomalyVerdict> = {
            let guard = baseline.read();
            points
                .iter()
                .map(|p| {
                    let score = guard.score(p, min_history);
                    AnomalyVerdict {
                        score,
                        is_anomaly: score >= self.config.threshold,
                    }
                })
                .collect()
        };

        let mut guard = baseline.write();
        for point in points {
            guard.record(point, self.config.max_history);
        }
        verdicts
    }
}
