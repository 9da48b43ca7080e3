//! Regex patterns for checkout page extraction.
//!
//! Amount patterns share one tail: optional symbol (group 1), number
//! (group 2), optional ISO code (group 3).

use lazy_static::lazy_static;
use regex::Regex;

/// Price symbols, multi-character symbols first so `R$` is not read as `$`.
const SYMBOL: &str = r"Rs|R\$|C\$|A\$|CHF|kr|[$€£¥₹]";

/// ISO codes in the currency lexicon.
const CODE: &str = r"USD|EUR|GBP|JPY|INR|CAD|AUD|CHF|SEK|BRL";

fn amount_rule(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?i){label}({SYMBOL})?\s*([0-9,]+\.?[0-9]*)\s*(?:({CODE})\b)?"
    ))
    .unwrap()
}

lazy_static! {
    // Labeled totals
    pub static ref TOTAL_PRICE: Regex = amount_rule(r"total\s*price[:\s]*");
    pub static ref TOTAL: Regex = amount_rule(r"total[:\s]+");
    pub static ref GRAND_TOTAL: Regex = amount_rule(r"grand[\s-]?total[:\s]+");

    // Soft labels
    pub static ref AMOUNT_LABELED: Regex = amount_rule(r"amount[:\s]+");
    pub static ref PAY_LABELED: Regex = amount_rule(r"pay[:\s]+");

    // Any amount, used inside elements that look like totals
    pub static ref ANY_AMOUNT: Regex = amount_rule("");

    // Page classification
    pub static ref CHECKOUT_URL: Regex = Regex::new(
        r"(?i)checkout|payment|cart|order"
    ).unwrap();

    pub static ref CHECKOUT_TEXT: Regex = Regex::new(
        r"(?i)card number|credit card|debit card|cvv|cvc|expir"
    ).unwrap();

    pub static ref CARD_INPUT_HINT: Regex = Regex::new(
        r"(?i)card|cvv|cvc|expir"
    ).unwrap();

    // Booking details
    pub static ref ADDRESS_POSTAL: Regex = Regex::new(
        r"([A-Z][a-zA-Z\s]+,\s*[A-Z][a-zA-Z\s]+,?\s*\d{5,})"
    ).unwrap();

    pub static ref ADDRESS_UAE: Regex = Regex::new(
        r"(?i)([A-Z][a-zA-Z\s]+,\s*United Arab Emirates)"
    ).unwrap();

    pub static ref ADDRESS_REGION: Regex = Regex::new(
        r"([A-Z][a-zA-Z\s]+,\s*[A-Z]{2,}\s*\d{5})"
    ).unwrap();

    pub static ref RATING: Regex = Regex::new(
        r"(?i)(\d+\.?\d*)\s*(/10|Wonderful|Excellent|Very Good|Good)"
    ).unwrap();

    pub static ref CHECK_IN_LONG: Regex = Regex::new(
        r"(?i)Check[- ]?in[:\s]+([A-Z][a-z]+,\s*[A-Z][a-z]+\s+\d{1,2},\s*\d{4})"
    ).unwrap();

    pub static ref CHECK_IN_NUMERIC: Regex = Regex::new(
        r"(?i)Check[- ]?in[:\s]+(\d{1,2}/\d{1,2}/\d{4})"
    ).unwrap();

    pub static ref CHECK_OUT_LONG: Regex = Regex::new(
        r"(?i)Check[- ]?out[:\s]+([A-Z][a-z]+,\s*[A-Z][a-z]+\s+\d{1,2},\s*\d{4})"
    ).unwrap();

    pub static ref CHECK_OUT_NUMERIC: Regex = Regex::new(
        r"(?i)Check[- ]?out[:\s]+(\d{1,2}/\d{1,2}/\d{4})"
    ).unwrap();

    pub static ref DURATION: Regex = Regex::new(
        r"(?i)(\d+\s+nights?,\s+\d+\s+rooms?)"
    ).unwrap();

    pub static ref GUESTS: Regex = Regex::new(
        r"(?i)(\d+\s+adults?(?:,\s*\d+\s+child(?:ren)?)?)"
    ).unwrap();

    pub static ref CANCELLATION: Regex = Regex::new(
        r"(?i)(free cancellation[^\n.]*|non-refundable)"
    ).unwrap();

    pub static ref BREAKFAST: Regex = Regex::new(
        r"(?i)breakfast included"
    ).unwrap();

    // Background image URL inside a CSS value
    pub static ref CSS_URL: Regex = Regex::new(
        r#"url\(\s*['"]?(.*?)['"]?\s*\)"#
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_rule_groups() {
        let caps = TOTAL.captures("Total: R$ 1,250.00 BRL").unwrap();
        assert_eq!(&caps[1], "R$");
        assert_eq!(&caps[2], "1,250.00");
        assert_eq!(&caps[3], "BRL");
    }

    #[test]
    fn test_code_needs_word_boundary() {
        let caps = TOTAL.captures("Total: 40 Audience").unwrap();
        assert_eq!(&caps[2], "40");
        assert!(caps.get(3).is_none());
    }

    #[test]
    fn test_multi_char_symbols_win() {
        let caps = ANY_AMOUNT.captures("C$12.00").unwrap();
        assert_eq!(&caps[1], "C$");
        let caps = ANY_AMOUNT.captures("rs 99").unwrap();
        assert_eq!(&caps[1], "rs");
    }

    #[test]
    fn test_css_url() {
        let caps = CSS_URL.captures(r#"url("https://cdn.example/room.jpg")"#).unwrap();
        assert_eq!(&caps[1], "https://cdn.example/room.jpg");
        let caps = CSS_URL.captures("url(/img/a.png)").unwrap();
        assert_eq!(&caps[1], "/img/a.png");
    }
}
