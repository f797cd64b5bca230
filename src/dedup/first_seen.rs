use dashmap::DashSet;

/// Remembers which `(user_id, sms_id)` pairs have already produced a
/// transaction. Only those pairs are recorded, so the set grows with
/// transactions rather than with every message seen.
#[derive(Default)]
pub struct MessageTracker {
    known: DashSet<(String, String)>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a pair is seen. Concurrent callers racing
    /// on the same pair get exactly one true.
    pub fn first_seen(&self, user_id: &str, sms_id: &str) -> bool {
        self.known.insert((user_id.to_string(), sms_id.to_string()))
    }

    pub fn contains(&self, user_id: &str, sms_id: &str) -> bool {
        self.known.contains(&(user_id.to_string(), sms_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_seen_once() {
        let tracker = MessageTracker::new();
        assert!(tracker.first_seen("u1", "42"));
        assert!(!tracker.first_seen("u1", "42"));
        assert!(tracker.first_seen("u2", "42"));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_contains_does_not_record() {
        let tracker = MessageTracker::new();
        assert!(!tracker.contains("u1", "7"));
        assert!(tracker.is_empty());
        assert!(tracker.first_seen("u1", "7"));
        assert!(tracker.contains("u1", "7"));
        assert!(!tracker.contains("u2", "7"));
    }

    #[test]
    fn test_concurrent_inserts_yield_one_winner() {
        let tracker = Arc::new(MessageTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.first_seen("u1", "same"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
