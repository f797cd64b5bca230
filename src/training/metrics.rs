/// Fraction of predictions equal to the truth. Zero for empty input.
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Per-class F1 averaged with weights equal to each class's support.
pub fn weighted_f1(truth: &[usize], predicted: &[usize], n_classes: usize) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_ = vec![0usize; n_classes];
    for (&t, &p) in truth.iter().zip(predicted) {
        if t == p {
            tp[t] += 1;
        } else {
            fp[p] += 1;
            fn_[t] += 1;
        }
    }

    let mut total = 0.0;
    for k in 0..n_classes {
        let support = tp[k] + fn_[k];
        if support == 0 {
            continue;
        }
        let denom = 2 * tp[k] + fp[k] + fn_[k];
        let f1 = if denom == 0 { 0.0 } else { 2.0 * tp[k] as f64 / denom as f64 };
        total += f1 * support as f64;
    }
    total / truth.len() as f64
}
