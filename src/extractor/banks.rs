use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::BankConfig;

/// Built-in sender codes. Config entries extend or override these.
const BUILTIN_BANKS: &[(&str, &str)] = &[
    ("SBI", "State Bank of India"),
    ("HDFC", "HDFC Bank"),
    ("ICICI", "ICICI Bank"),
    ("AXIS", "Axis Bank"),
    ("KOTAK", "Kotak Mahindra Bank"),
    ("BOB", "Bank of Baroda"),
    ("BARODA", "Bank of Baroda"),
    ("PNB", "Punjab National Bank"),
    ("UNION", "Union Bank of India"),
    ("CANARA", "Canara Bank"),
    ("CENTBK", "Central Bank of India"),
    ("CBOI", "Central Bank of India"),
    ("IPPB", "India Post Payments Bank"),
    ("IDBI", "IDBI Bank"),
    ("INDBNK", "Indian Bank"),
    ("FEDERAL", "Federal Bank"),
    ("UCO", "UCO Bank"),
    ("IOB", "Indian Overseas Bank"),
    ("INDUSIND", "IndusInd Bank"),
    ("YESBNK", "Yes Bank"),
    ("BANDHAN", "Bandhan Bank"),
    ("RBL", "RBL Bank"),
    ("CITI", "Citibank"),
    ("HSBC", "HSBC"),
    ("STANCHART", "Standard Chartered"),
    ("AMEX", "American Express"),
    ("PAYTM", "Paytm Payments Bank"),
    ("BAJFIN", "Bajaj Finance"),
    ("TATACAP", "Tata Capital"),
    ("MUTHOOT", "Muthoot Finance"),
    ("LICHFL", "LIC Housing Finance"),
];

struct BankEntry {
    code: String,
    name: String,
    mention: Regex,
}

/// Sender-code to bank-name lookup with body-mention fallbacks.
pub struct BankDirectory {
    // Longest code first so "BARODA" wins over "BOB"-style prefixes.
    entries: Vec<BankEntry>,
}

fn dlt_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2}-").expect("invalid dlt prefix regex"))
}

fn signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\s*([A-Za-z][A-Za-z ]{1,38}?)\s*\.?$").expect("invalid signature regex"))
}

/// Words that mark an unknown signature as a lender rather than a sign-off.
fn institution_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:bank|bnk|finance|financial|co-?op(?:erative)?|credit\s+society)\b")
            .expect("invalid institution suffix regex")
    })
}

/// Codes this short collide with ordinary header words ("JIOBUZ", "FLUCOS"),
/// so they only count at the start of the header.
const ANCHORED_CODE_LEN: usize = 3;

impl BankDirectory {
    /// Build the directory from the built-in table plus config entries.
    pub fn build(extra: &[BankConfig]) -> eyre::Result<Self> {
        let mut names: HashMap<String, String> = BUILTIN_BANKS
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();

        for bank in extra {
            let code = bank.code.trim().to_uppercase();
            if code.is_empty() {
                tracing::error!(name = %bank.name, "Bank entry without a code in config, skipping");
                continue;
            }
            if let Some(previous) = names.insert(code.clone(), bank.name.trim().to_string()) {
                tracing::debug!(code = %code, previous = %previous, "Bank name overridden from config");
            }
        }

        if names.is_empty() {
            return Err(eyre::eyre!("Bank directory is empty"));
        }

        let mut entries = names
            .into_iter()
            .map(|(code, name)| {
                let pattern = format!(
                    r"\b{}\b|(?i:\b{}\b)",
                    regex::escape(&code),
                    regex::escape(&name).replace(' ', r"\s+")
                );
                let mention = Regex::new(&pattern)
                    .map_err(|e| eyre::eyre!("Invalid bank pattern for '{}': {}", code, e))?;
                Ok(BankEntry { code, name, mention })
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| b.code.len().cmp(&a.code.len()).then_with(|| a.code.cmp(&b.code)));

        tracing::debug!(count = entries.len(), "Bank directory built");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bank named by a sender header such as `VM-SBIINB`.
    pub fn from_sender(&self, sender: &str) -> Option<&str> {
        let upper = sender.trim().to_uppercase();
        let header = dlt_prefix_re().replace(&upper, "");
        if header.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| {
                if e.code.len() <= ANCHORED_CODE_LEN {
                    header.starts_with(e.code.as_str())
                } else {
                    header.contains(e.code.as_str())
                }
            })
            .map(|e| e.name.as_str())
    }

    /// Bank explicitly mentioned in the message text.
    pub fn from_body(&self, body: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.mention.find(body).map(|m| (m.start(), e)))
            .min_by_key(|(start, _)| *start)
            .map(|(_, e)| e.name.as_str())
    }

    /// Trailing "-SBI" or "- Team HDFC Bank" signature.
    ///
    /// An unknown signature is returned verbatim only when it reads like an
    /// institution name ("- Saraswat Bank"); "- Thank you" yields nothing.
    pub fn from_signature(&self, body: &str) -> Option<String> {
        let caps = signature_re().captures(body.trim())?;
        let signature = caps.get(1)?.as_str().trim();
        if signature.len() < 3 {
            return self.lookup_code(signature).map(str::to_string);
        }
        self.lookup_code(signature)
            .or_else(|| self.from_body(signature))
            .map(str::to_string)
            .or_else(|| {
                institution_suffix_re()
                    .is_match(signature)
                    .then(|| signature.to_string())
            })
    }

    pub fn lookup_code(&self, code: &str) -> Option<&str> {
        let code = code.trim().to_uppercase();
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.as_str())
    }

    /// True when `s` is itself a bank code or header.
    pub fn is_bank_code(&self, s: &str) -> bool {
        self.from_sender(s).is_some()
    }

    /// Sender table first, then body mention, then trailing signature.
    pub fn resolve(&self, sender: &str, body: &str) -> Option<String> {
        self.from_sender(sender)
            .or_else(|| self.from_body(body))
            .map(str::to_string)
            .or_else(|| self.from_signature(body))
    }
}
