use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Read;

use crate::classifier::LabeledExample;
use crate::sms::preprocess::{clean_text, extract_features};
use crate::sms::Label;

/// Parse a labeled seed corpus.
/// Expected CSV columns: body, sender, label
/// Rows with an empty body or an unknown label are skipped.
pub fn parse_corpus_csv(path: &str) -> eyre::Result<Vec<LabeledExample>> {
    let file = std::fs::File::open(path).map_err(|e| eyre::eyre!("Failed to open corpus CSV '{}': {}", path, e))?;
    let examples = parse_corpus_reader(file)?;
    tracing::info!(examples = examples.len(), path, "Parsed seed corpus");
    Ok(examples)
}

pub fn parse_corpus_reader<R: Read>(input: R) -> eyre::Result<Vec<LabeledExample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut examples = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let record = result.map_err(|e| eyre::eyre!("Failed to read corpus row: {}", e))?;
        let body = record.get(0).unwrap_or("").trim();
        let sender = record.get(1).unwrap_or("").trim();
        let label = record.get(2).unwrap_or("").trim();

        let Ok(label) = label.parse::<Label>() else {
            skipped += 1;
            continue;
        };
        if body.is_empty() {
            skipped += 1;
            continue;
        }
        examples.push(LabeledExample {
            text: clean_text(body),
            features: extract_features(body, sender),
            label,
        });
    }

    if skipped > 0 {
        tracing::warn!(skipped, "Skipped unusable corpus rows");
    }
    Ok(examples)
}

/// Bounded buffer of auto-labeled examples collected from live traffic.
/// Oldest examples are dropped first.
pub struct Corpus {
    capacity: usize,
    examples: Mutex<VecDeque<LabeledExample>>,
}

impl Corpus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            examples: Mutex::new(VecDeque::new()),
        }
    }

    pub fn extend<I: IntoIterator<Item = LabeledExample>>(&self, items: I) -> usize {
        let mut examples = self.examples.lock();
        let mut added = 0;
        for item in items {
            examples.push_back(item);
            added += 1;
        }
        while examples.len() > self.capacity {
            examples.pop_front();
        }
        added
    }

    pub fn len(&self) -> usize {
        self.examples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<LabeledExample> {
        self.examples.lock().iter().cloned().collect()
    }
}
