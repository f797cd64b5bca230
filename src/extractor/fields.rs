use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::sms::patterns;
use crate::sms::{Category, PaymentMethod};

fn amount_capture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\bRs\.?|\bINR|₹)\s*(\d[\d,]*(?:\.\d{1,2})?)|\b(\d[\d,]*(?:\.\d{1,2})?)\s*(?:Rs\b|INR\b|₹)",
        )
        .expect("invalid amount capture regex")
    })
}

fn balance_context_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:bal|balance|limit|due)\b[^\d]{0,15}$").expect("invalid balance context regex")
    })
}

/// Parses a rupee figure such as `1,00,000.50`.
pub fn parse_rupees(raw: &str) -> Option<BigDecimal> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    let value = BigDecimal::from_str(digits.trim_end_matches('.')).ok()?;
    (value > BigDecimal::from(0)).then_some(value)
}

/// Primary transaction amount. Figures introduced as a balance, limit or
/// amount due are used only when nothing else is quoted.
pub fn parse_amount(text: &str) -> Option<BigDecimal> {
    let mut fallback = None;
    for caps in amount_capture_re().captures_iter(text) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let Some(value) = parse_rupees(raw.as_str()) else {
            continue;
        };
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        if balance_context_re().is_match(&text[..start]) {
            fallback.get_or_insert(value);
            continue;
        }
        return Some(value);
    }
    fallback
}

fn account_capture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\ba/?c\b|\baccount\b|\bacct\b)\.?\s*(?:no\.?|number|#|ending\s*(?:with|in)?)?[:\s]*([X*]*\s*\d{3,})",
        )
        .expect("invalid account capture regex")
    })
}

fn card_capture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bcard\b\s*(?:ending\s*(?:with|in)?|no\.?|number)?[:\s]*(?:[X*]*\s*)?(\d{2,6})\b",
        )
        .expect("invalid card capture regex")
    })
}

fn ending_capture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bending\s*(?:with|in)?[:\s]*[X*]*(\d{4})\b").expect("invalid ending capture regex")
    })
}

/// Masks an account token so at most the last four digits stay visible.
pub fn mask_account(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '*' || c == 'x' { 'X' } else { c })
        .collect();
    let digits: String = compact.chars().filter(|c| c.is_ascii_digit()).collect();
    if compact.starts_with('X') && digits.len() <= 4 {
        return compact;
    }
    let visible = &digits[digits.len().saturating_sub(4)..];
    format!("XX{}", visible)
}

pub fn parse_account(text: &str) -> Option<String> {
    account_capture_re()
        .captures(text)
        .or_else(|| card_capture_re().captures(text))
        .or_else(|| ending_capture_re().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| mask_account(m.as_str()))
}

fn upi_reference_cue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bUPI\s*(?:Ref|txn)|\bRRN\b").expect("invalid upi cue regex"))
}

pub fn parse_payment_method(text: &str) -> PaymentMethod {
    if patterns::upi_re().is_match(text) || upi_reference_cue_re().is_match(text) {
        PaymentMethod::Upi
    } else if patterns::neft_re().is_match(text) {
        PaymentMethod::Neft
    } else if patterns::imps_re().is_match(text) {
        PaymentMethod::Imps
    } else if patterns::rtgs_re().is_match(text) {
        PaymentMethod::Rtgs
    } else if patterns::card_re().is_match(text) {
        PaymentMethod::Card
    } else if patterns::wallet_re().is_match(text) {
        PaymentMethod::Wallet
    } else {
        PaymentMethod::Other
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\bUPI\s*(?:Ref|reference|txn)\.?\s*(?:no\.?|number|#|id)?|\bRef(?:erence)?\.?\s*(?:No\.?|number|#|id)?|\bUTR\s*(?:No\.?|number|#)?|\bRRN\b|\bTxn\s*(?:id|no\.?)|\bIMPS\s*Ref)\s*[:.\s#-]*([A-Z0-9]{6,})",
        )
        .expect("invalid reference regex")
    })
}

/// UPI RRN or bank UTR.
pub fn parse_reference(text: &str) -> Option<String> {
    reference_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|r| r.chars().any(|c| c.is_ascii_digit()))
        .map(|r| r.to_uppercase())
}

fn counterparty_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:transfer\s+(?:to|from)|UPI\s+(?:to|from)|for\s+UPI\s+to|to|from|by)\s+([A-Za-z][A-Za-z .&'-]*?)\s*(?:\b(?:on|ref|via|at|for|rs|inr|upi|avl|bal|info|thru|using|dated|towards|is|has|a/c|neft|imps|rtgs|from|to)\b|[.,;:(]|-\s|\d|$)",
        )
        .expect("invalid counterparty regex")
    })
}

fn merchant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\bat|@)\s+([A-Za-z][A-Za-z0-9 .&'-]*?)\s*(?:\b(?:on|ref|rs|inr|avl|via|txn|for)\b|[.,;:(]|$)",
        )
        .expect("invalid merchant regex")
    })
}

const NAME_STOPWORDS: &[&str] = &[
    "your", "the", "a", "an", "rs", "inr", "you", "self", "account", "acct", "card", "bank", "my",
    "our", "us", "be", "avoid", "beneficiary", "mobile", "registered",
];

/// Rail names that precede the real name, as in "by NEFT ACME CORP".
const RAIL_TOKENS: &[&str] = &["neft", "imps", "rtgs", "upi"];

fn strip_rail(name: &str) -> &str {
    let mut rest = name.trim();
    loop {
        let (first, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if first.is_empty() || !RAIL_TOKENS.contains(&first.to_lowercase().as_str()) {
            return rest;
        }
        rest = tail.trim_start();
    }
}

fn clean_name(raw: &str) -> Option<String> {
    let name = strip_rail(raw).trim_end_matches(['-', '.', '\'', '&']).trim();
    let first = name.split_whitespace().next()?.to_lowercase();
    if NAME_STOPWORDS.contains(&first.as_str()) || name.len() < 2 || name.len() > 40 {
        return None;
    }
    Some(name.to_string())
}

/// "From HDFC Bank A/C *1234" names the holder's own account, not a payee.
fn names_own_account(rest: &str) -> bool {
    let rest = rest.trim_start().to_lowercase();
    ["a/c", "acct", "account", "card"].iter().any(|p| rest.starts_with(p))
}

/// Person or merchant from "to/from/by NAME" or "at MERCHANT" phrasing.
///
/// Candidates are tried left to right. One that `is_bank` recognises, or that
/// is directly followed by an account or card reference, is skipped in
/// favour of the next.
pub fn parse_counterparty(text: &str, is_bank: impl Fn(&str) -> bool) -> Option<String> {
    let mut pos = 0;
    while let Some(caps) = counterparty_re().captures_at(text, pos) {
        let Some(m) = caps.get(1) else {
            break;
        };
        // The terminator word may open the next phrase ("by NEFT from X").
        pos = m.end();
        if names_own_account(&text[m.end()..]) {
            continue;
        }
        if let Some(name) = clean_name(m.as_str()).filter(|n| !is_bank(n)) {
            return Some(name);
        }
    }
    merchant_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| clean_name(m.as_str()))
        .find(|n| !is_bank(n))
}

fn numeric_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b|\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{2,4})\b")
            .expect("invalid numeric date regex")
    })
}

fn day_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?[\s-]?(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[\s,-]*(\d{2,4})\b",
        )
        .expect("invalid day month regex")
    })
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s*(\d{2,4})\b",
        )
        .expect("invalid month day regex")
    })
}

fn month_number(name: &str) -> Option<u32> {
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| name.to_lowercase().starts_with(m))?;
    Some(idx as u32 + 1)
}

fn make_date(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First valid date written in the message body.
pub fn parse_body_date(text: &str) -> Option<NaiveDate> {
    for caps in numeric_date_re().captures_iter(text) {
        let date = if let (Some(y), Some(m), Some(d)) = (caps.get(1), caps.get(2), caps.get(3)) {
            m.as_str()
                .parse()
                .ok()
                .and_then(|m| make_date(y.as_str(), m, d.as_str()))
        } else if let (Some(d), Some(m), Some(y)) = (caps.get(4), caps.get(5), caps.get(6)) {
            m.as_str()
                .parse()
                .ok()
                .and_then(|m| make_date(y.as_str(), m, d.as_str()))
        } else {
            None
        };
        if date.is_some() {
            return date;
        }
    }

    let named = day_month_re()
        .captures_iter(text)
        .find_map(|caps| make_date(&caps[3], month_number(&caps[2])?, &caps[1]));
    if named.is_some() {
        return named;
    }

    month_day_re()
        .captures_iter(text)
        .find_map(|caps| make_date(&caps[3], month_number(&caps[1])?, &caps[2]))
}

/// Local calendar date of an epoch-millisecond timestamp.
pub fn timestamp_date(timestamp_ms: i64, offset: FixedOffset) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&offset)
        .date_naive()
}

pub fn parse_date(text: &str, timestamp_ms: i64, offset: FixedOffset) -> NaiveDate {
    parse_body_date(text).unwrap_or_else(|| timestamp_date(timestamp_ms, offset))
}

fn category_res() -> &'static [(Category, Regex)] {
    static RES: OnceLock<Vec<(Category, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("invalid category regex");
        vec![
            (Category::Salary, re(r"(?i)\bsalary\b|\bsal\s+cr|\bpayroll\b|\bstipend\b")),
            (
                Category::Emi,
                re(r"(?i)\bemi\b|\bloan\b|\bnach\b|\becs\b|\binstal+ment|\bbajaj\s*fin"),
            ),
            (
                Category::Utility,
                re(r"(?i)\belectricity\b|\bwater\s*bill|\bgas\b|\bbroadband\b|\bbbps\b|\bbill\s*pay|\bbescom\b|\bmseb\b|\btata\s*power\b|\bpiped\s*gas\b"),
            ),
            (
                Category::Recharge,
                re(r"(?i)\brecharge|\bprepaid\b|\bdth\b|\bfastag\b|\bairtel\b|\bjio\b|\bvodafone\b|\bbsnl\b"),
            ),
            (
                Category::Shopping,
                re(r"(?i)\bamazon\b|\bflipkart\b|\bmyntra\b|\bajio\b|\bmeesho\b|\bswiggy\b|\bzomato\b|\bblinkit\b|\bzepto\b|\bnykaa\b|\bpos\b|\bpurchase\b|\bshopping\b|\bmart\b|\bstore\b"),
            ),
            (
                Category::Transfer,
                re(r"(?i)\btransfer|\bupi\b|\bimps\b|\bneft\b|\brtgs\b|\bvpa\b|\bsent\s+to\b|\breceived\s+from\b"),
            ),
        ]
    })
}

/// Coarse category from keyword cues in the text and counterparty.
pub fn categorize(text: &str, counterparty: Option<&str>) -> Category {
    category_res()
        .iter()
        .find(|(_, re)| re.is_match(text) || counterparty.is_some_and(|c| re.is_match(c)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SBI_CREDIT: &str = "Dear SBI User, your A/c X1230-credited by Rs.1000 on 03Oct25 transfer from SUBHASH BOKADE Ref No 091542697620 -SBI";

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[test]
    fn test_amount_with_indian_grouping() {
        assert_eq!(parse_amount("Rs.1,000.50 credited"), Some(BigDecimal::from_str("1000.50").unwrap()));
        assert_eq!(parse_amount("INR 1,00,000 debited"), Some(BigDecimal::from(100_000)));
        assert_eq!(parse_amount("paid 450 Rs at shop"), Some(BigDecimal::from(450)));
        assert_eq!(parse_amount("₹ 99.9 sent"), Some(BigDecimal::from_str("99.9").unwrap()));
        assert_eq!(parse_amount("Rs.1000. Avl"), Some(BigDecimal::from(1000)));
    }

    #[test]
    fn test_amount_skips_balance_figure() {
        let text = "Avl Bal Rs 52,000.00 after Rs 1,200 debited";
        assert_eq!(parse_amount(text), Some(BigDecimal::from(1200)));
        assert_eq!(parse_amount("Avl Bal Rs 500"), Some(BigDecimal::from(500)));
    }

    #[test]
    fn test_amount_missing_or_zero() {
        assert_eq!(parse_amount("credited to your account"), None);
        assert_eq!(parse_amount("Rs 0.00 debited"), None);
    }

    #[test]
    fn test_account_masks() {
        assert_eq!(parse_account(SBI_CREDIT).as_deref(), Some("X1230"));
        assert_eq!(parse_account("Card ending 0916 used").as_deref(), Some("XX0916"));
        assert_eq!(parse_account("A/c no. 123456789012 debited").as_deref(), Some("XX9012"));
        assert_eq!(parse_account("no account here"), None);
    }

    #[test]
    fn test_payment_method() {
        assert_eq!(parse_payment_method("paid via UPI"), PaymentMethod::Upi);
        assert_eq!(parse_payment_method("NEFT credit of Rs 5000"), PaymentMethod::Neft);
        assert_eq!(parse_payment_method("IMPS/P2A/1234"), PaymentMethod::Imps);
        assert_eq!(parse_payment_method("spent on Credit Card XX12"), PaymentMethod::Card);
        assert_eq!(parse_payment_method("added to Paytm wallet"), PaymentMethod::Wallet);
        assert_eq!(parse_payment_method(SBI_CREDIT), PaymentMethod::Other);
    }

    #[test]
    fn test_reference() {
        assert_eq!(parse_reference(SBI_CREDIT).as_deref(), Some("091542697620"));
        assert_eq!(parse_reference("UPI Ref: 412345678901").as_deref(), Some("412345678901"));
        assert_eq!(parse_reference("UTR No HDFCN52025100312").as_deref(), Some("HDFCN52025100312"));
        assert_eq!(parse_reference("Refer a friend"), None);
    }

    fn no_banks(_: &str) -> bool {
        false
    }

    #[test]
    fn test_counterparty() {
        assert_eq!(parse_counterparty(SBI_CREDIT, no_banks).as_deref(), Some("SUBHASH BOKADE"));
        assert_eq!(
            parse_counterparty("Rs 250 paid to RAMESH KUMAR via UPI", no_banks).as_deref(),
            Some("RAMESH KUMAR")
        );
        assert_eq!(
            parse_counterparty("Rs 1,499 spent on card XX12 at AMAZON RETAIL on 05-10-25", no_banks).as_deref(),
            Some("AMAZON RETAIL")
        );
        assert_eq!(
            parse_counterparty("Rs 50 received from SUBHASH ONKAR Ref 123456", no_banks).as_deref(),
            Some("SUBHASH ONKAR")
        );
        assert_eq!(parse_counterparty("credited to your account", no_banks), None);
    }

    #[test]
    fn test_counterparty_skips_own_bank_account() {
        let text = "Sent Rs.250.00 From HDFC Bank A/C *1234 To RAMESH KUMAR On 05/10/25 Ref 512345678901";
        assert_eq!(parse_counterparty(text, no_banks).as_deref(), Some("RAMESH KUMAR"));

        let is_hdfc = |name: &str| name.eq_ignore_ascii_case("HDFC Bank");
        let text = "Rs 500 debited from HDFC Bank to PRIYA SHARMA on 05-10-25";
        assert_eq!(parse_counterparty(text, is_hdfc).as_deref(), Some("PRIYA SHARMA"));
    }

    #[test]
    fn test_counterparty_stops_at_rail_words() {
        let text = "Rs 1,500.00 credited to your a/c XX1234 by NEFT from ACME CORP PVT LTD";
        assert_eq!(parse_counterparty(text, no_banks).as_deref(), Some("ACME CORP PVT LTD"));
        assert_eq!(
            parse_counterparty("Rs 900 credited by IMPS ZETA LABS Ref 998877", no_banks).as_deref(),
            Some("ZETA LABS")
        );
        assert_eq!(parse_counterparty("Rs 900 received by NEFT", no_banks), None);
    }

    #[test]
    fn test_body_dates() {
        assert_eq!(parse_body_date(SBI_CREDIT), NaiveDate::from_ymd_opt(2025, 10, 3));
        assert_eq!(parse_body_date("on 05-10-2025"), NaiveDate::from_ymd_opt(2025, 10, 5));
        assert_eq!(parse_body_date("on 05/10/25"), NaiveDate::from_ymd_opt(2025, 10, 5));
        assert_eq!(parse_body_date("on 3 Oct 2025"), NaiveDate::from_ymd_opt(2025, 10, 3));
        assert_eq!(parse_body_date("on Oct 3, 2025"), NaiveDate::from_ymd_opt(2025, 10, 3));
        assert_eq!(parse_body_date("on 2025-10-03"), NaiveDate::from_ymd_opt(2025, 10, 3));
        assert_eq!(parse_body_date("on 45-13-2025"), None);
    }

    #[test]
    fn test_date_falls_back_to_timestamp_in_offset() {
        // 2025-10-02T20:00:00Z is already 3 October in IST.
        let ts = 1_759_435_200_000;
        assert_eq!(parse_date("no date", ts, ist()), NaiveDate::from_ymd_opt(2025, 10, 3).unwrap());
    }

    #[test]
    fn test_categories() {
        assert_eq!(categorize(SBI_CREDIT, Some("SUBHASH BOKADE")), Category::Transfer);
        assert_eq!(categorize("SALARY credited Rs 50000", None), Category::Salary);
        assert_eq!(categorize("Rs 399 debited for Jio recharge", None), Category::Recharge);
        assert_eq!(categorize("NACH debit for loan EMI", None), Category::Emi);
        assert_eq!(categorize("paid BESCOM electricity bill", None), Category::Utility);
        assert_eq!(categorize("spent", Some("FLIPKART")), Category::Shopping);
        assert_eq!(categorize("Rs 10 debited", None), Category::Other);
    }
}
