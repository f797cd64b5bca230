//! Compiled text patterns shared by the preprocessor, labeler and extractor.
//!
//! Every pattern is a literal compiled once on first use. A literal that fails
//! to compile is a programming error caught by the tests below, not a runtime
//! condition.

use regex::Regex;
use std::sync::OnceLock;

use super::types::TransactionType;

/// Sender headers used by Indian banks, card issuers, wallets and lenders.
pub fn bank_sender_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(SBI|HDFC|ICICI|AXIS|KOTAK|BOB|PNB|UNION|CANARA|CENTBK|IPPB|IDBI|INDBNK|FEDERAL|BARODA|SYNDCT|ANDHRA|ALLAHABAD|UCO|IOB|MAHABK|DENABNK|VIJAYA|CORPBNK|INDUSIND|YESBNK|BANDHAN|RBL|CITI|HSBC|STANCHART|AMEX|PAYTM|PHONEPE|GPAY|AMAZONPAY|BAJFIN|TATACAP|MUTHOOT|MANAPPURAM|LICHFL)",
        )
        .expect("invalid bank sender regex")
    })
}

pub fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\bRs\.?|\bINR|₹)\s*[\d,]*\d(?:\.\d{1,2})?|\b\d[\d,]*(?:\.\d{1,2})?\s*(?:Rs\b|INR\b|₹)",
        )
        .expect("invalid amount regex")
    })
}

pub fn credit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(credited|credit|received|deposited|added|refunded|refund|cashback|reversed|cr)\b",
        )
        .expect("invalid credit regex")
    })
}

pub fn debit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(debited|debit|withdrawn|spent|paid|transferred|purchase|charged|deducted|sent|dr)\b",
        )
        .expect("invalid debit regex")
    })
}

/// Wording that quotes an amount before any money has moved.
fn direction_veto_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:bill|amount|total|min|outstanding|amt)[.\s]*(?:due|payable)|statement.*(?:generated|ready|available)|legal\s*(?:action|notice)|despite.*reminder|several\s*reminders|(?:pay|click).*quickpay|please\s*(?:pay|clear|settle)|further\s*delay|mandate.*(?:revoked|failed|rejected)|(?:txn|transaction).*(?:declined|failed)|(?:declined|failed).*insufficient|fund\s*bal|securities\s*bal|reported.*(?:fund|securities)|is\s+due\s+on|payable\s*by|will\s+be\s+(?:debited|credited)",
        )
        .expect("invalid direction veto regex")
    })
}

/// Money-movement words. Group 1 is a credit, group 2 a debit.
fn direction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(credited|received|deposited|refund(?:ed)?|cashback|reversed|added)|(debited|withdrawn|spent|paid|transferred|purchased?|charged|deducted|sent))\b",
        )
        .expect("invalid direction regex")
    })
}

/// Credit or debit from the earliest money-movement word, unless the wording
/// says no money has moved yet. The rule sub-label, the ML fallback sub-label
/// and the extracted transaction type all come from here.
pub fn direction(text: &str) -> Option<TransactionType> {
    if direction_veto_re().is_match(text) {
        return None;
    }
    let caps = direction_re().captures(text)?;
    if caps.get(1).is_some() {
        Some(TransactionType::Credit)
    } else {
        Some(TransactionType::Debit)
    }
}

/// Verbs that only appear when money actually moved.
pub fn transaction_verb_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(credited|debited|received|deposited|withdrawn|spent|paid|transferred|refunded|reversed|sent)\b",
        )
        .expect("invalid transaction verb regex")
    })
}

pub fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\ba/?c\b|\baccount\b|\bacct\b|\bcard\b)\s*(?:no\.?|number|#|ending)?[:\s]*[X*]*\s*\d{3,}",
        )
        .expect("invalid account regex")
    })
}

pub fn upi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bUPI\b|\bVPA\b|@\w+bank|@\w+psp|@ok\w+|@ybl\b|@paytm\b")
            .expect("invalid upi regex")
    })
}

pub fn neft_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bNEFT\b").expect("invalid neft regex"))
}

pub fn imps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bIMPS\b").expect("invalid imps regex"))
}

pub fn rtgs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bRTGS\b").expect("invalid rtgs regex"))
}

pub fn card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(card|debit\s*card|credit\s*card|ATM|POS|swipe)\b")
            .expect("invalid card regex")
    })
}

pub fn wallet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(wallet|paytm|phonepe|gpay|amazon\s*pay|freecharge|mobikwik)\b")
            .expect("invalid wallet regex")
    })
}

pub fn otp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(OTP|one.?time\s*password|verification\s*code|security\s*code|pin\s*is|code\s*is|password\s*is)\b",
        )
        .expect("invalid otp regex")
    })
}

pub fn balance_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(balance|bal|avl\.?\s*bal|available\s*bal(?:ance)?|outstanding|total\s*(?:amt|amount)\s*due|min\s*(?:amt|amount)\s*due)\b",
        )
        .expect("invalid balance regex")
    })
}

/// Phrasing typical of lottery and account-takeover scams.
pub fn spam_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(congratulations.*won|\bwinner\b|lottery|crore.*prize|lakh.*prize|claim\s*now|lucky\s*draw|free\s*gift|urgent.*kyc.*expire|suspend.*account.*click|verify.*immediately.*link)",
        )
        .expect("invalid spam phrase regex")
    })
}

pub fn promo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\boffers?\b|\bdiscount|\bsale\b|cashback\s*up\s*to|\boff\s*on\b|\bsubscribe|install\s*now|\bdownload|\bcoupon|\bvoucher|flat\s*\d+%|upto\s*\d+%|\bexclusive|limited\s*time|special\s*offer|free\s*trial|premium\s*free|\bunlock)",
        )
        .expect("invalid promo regex")
    })
}

/// Financial wording that does not describe a completed transfer.
pub fn non_transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(statement.*generated|statement.*ready|emi\s*reminder|payment\s*reminder|payment\s*due|overdue|credit\s*score|cibil|insurance.*renew|policy.*expire|loan\s*(?:offer|approved|eligible)|pre.?approved|upgrade\s*(?:card|limit)|increase.*limit|reward\s*points|will\s*be\s*debited|is\s*due\b)",
        )
        .expect("invalid non-transaction regex")
    })
}

pub fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://\S+|\bwww\.\S+").expect("invalid url regex"))
}

pub fn phone_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{10}\b").expect("invalid phone number regex"))
}

pub fn phone_sender_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d{10,}$").expect("invalid phone sender regex"))
}

/// DLT header such as `VM-SBIINB` or `AX-HDFCBK-S`.
pub fn shortcode_sender_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[A-Z]{2}-[A-Z0-9]{3,}").expect("invalid shortcode regex"))
}

pub fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("invalid ws regex"))
}
