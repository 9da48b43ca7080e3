//! Total amount extraction.
//!
//! Text rules are tried in a fixed order and the first rule with a positive
//! candidate decides; candidates are never merged across rules. When no rule
//! matches, elements whose class or id mentions "total" are scanned.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::patterns::{AMOUNT_LABELED, ANY_AMOUNT, GRAND_TOTAL, PAY_LABELED, TOTAL, TOTAL_PRICE};
use crate::currency::{detect_currency, Currency};
use crate::models::AmountMatch;
use crate::page::{Page, PageElement, Selector, SelectorList};

/// Which candidate a rule selects when it matches more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// The first positive candidate.
    First,
    /// The last positive candidate; running totals end with the final one.
    Last,
}

/// One entry of the ranked rule table.
#[derive(Debug, Clone, Copy)]
pub struct AmountRule {
    pub label: &'static str,
    pub pattern: &'static Regex,
    pub pick: Pick,
}

lazy_static! {
    /// Text rules in priority order.
    pub static ref AMOUNT_RULES: [AmountRule; 5] = [
        AmountRule { label: "total price", pattern: &TOTAL_PRICE, pick: Pick::Last },
        AmountRule { label: "total", pattern: &TOTAL, pick: Pick::Last },
        AmountRule { label: "grand total", pattern: &GRAND_TOTAL, pick: Pick::Last },
        AmountRule { label: "amount", pattern: &AMOUNT_LABELED, pick: Pick::First },
        AmountRule { label: "pay", pattern: &PAY_LABELED, pick: Pick::First },
    ];

    static ref TOTAL_ELEMENTS: SelectorList = SelectorList::new(vec![
        Selector::any().contains("class", "total"),
        Selector::any().contains("id", "total"),
    ]);
}

impl AmountRule {
    /// Every positive candidate of this rule, in text order.
    pub fn candidates(&self, text: &str, default_currency: Currency) -> Vec<AmountMatch> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| candidate(&caps, default_currency))
            .collect()
    }

    /// The candidate this rule selects.
    pub fn select(&self, text: &str, default_currency: Currency) -> Option<AmountMatch> {
        let mut candidates = self.candidates(text, default_currency);
        debug!("Rule '{}' found {} candidates", self.label, candidates.len());
        match self.pick {
            Pick::First => candidates.into_iter().next(),
            Pick::Last => candidates.pop(),
        }
    }
}

/// Total amount extractor over page text and total-like elements.
#[derive(Debug, Clone)]
pub struct AmountExtractor {
    default_currency: Currency,
}

impl AmountExtractor {
    pub fn new(default_currency: Currency) -> Self {
        Self { default_currency }
    }

    /// Run the full pipeline against a page.
    pub fn extract_from_page(&self, page: &impl Page) -> Option<AmountMatch> {
        match page.body_text() {
            Ok(Some(text)) => {
                if let Some(found) = self.extract(&text) {
                    return Some(found);
                }
            }
            Ok(None) => debug!("Body not rendered, skipping text rules"),
            Err(e) => warn!("Could not read page text: {}", e),
        }

        match self.extract_from_elements(page) {
            Ok(found) => found,
            Err(e) => {
                warn!("Could not query total elements: {}", e);
                None
            }
        }
    }

    /// Apply the text rules in priority order.
    pub fn extract(&self, text: &str) -> Option<AmountMatch> {
        for rule in AMOUNT_RULES.iter() {
            if let Some(found) = rule.select(text, self.default_currency) {
                info!(
                    "Rule '{}' selected {} {} from '{}'",
                    rule.label, found.amount, found.currency_code, found.original_text
                );
                return Some(found);
            }
        }
        debug!("No text rule matched");
        None
    }

    /// Scan elements whose class or id mentions "total", in document order.
    pub fn extract_from_elements(
        &self,
        page: &impl Page,
    ) -> crate::page::Result<Option<AmountMatch>> {
        let elements = page.query(&TOTAL_ELEMENTS)?;
        debug!("Scanning {} total-like elements", elements.len());

        for element in &elements {
            if let Some(found) = self.element_amount(element) {
                info!(
                    "Found total {} {} in {}",
                    found.amount,
                    found.currency_code,
                    element.describe()
                );
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    fn element_amount(&self, element: &PageElement) -> Option<AmountMatch> {
        let text = element.text.as_str();
        let mut first_plain: Option<Decimal> = None;

        for caps in ANY_AMOUNT.captures_iter(text) {
            let amount = match parse_amount(&caps[2]) {
                Some(amount) => amount,
                None => continue,
            };
            let symbol = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(3).map(|m| m.as_str());

            if !symbol.is_empty() || code.is_some() {
                let currency = resolve_currency(symbol, code, self.default_currency);
                return Some(AmountMatch::new(amount, currency, text.trim()));
            }
            if first_plain.is_none() {
                first_plain = Some(amount);
            }
        }

        let amount = first_plain?;
        let currency = detect_currency(text).unwrap_or(self.default_currency);
        Some(AmountMatch::new(amount, currency, text.trim()))
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}

/// Extract the authoritative total from a page.
pub fn extract_total_amount(page: &impl Page, default_currency: Currency) -> Option<AmountMatch> {
    AmountExtractor::new(default_currency).extract_from_page(page)
}

/// Extract the authoritative total from rendered text only.
pub fn extract_total_amount_from_text(text: &str, default_currency: Currency) -> Option<AmountMatch> {
    AmountExtractor::new(default_currency).extract(text)
}

/// Parse a page amount such as `1,250.00`. Commas are thousands separators.
/// Only strictly positive amounts are returned.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim().trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(cleaned)
        .ok()
        .filter(|amount| *amount > Decimal::ZERO)
}

/// Resolve the currency of a match: explicit code, then rupee notations,
/// then the symbol lexicon, then the default.
pub fn resolve_currency(symbol: &str, code: Option<&str>, default_currency: Currency) -> Currency {
    if let Some(currency) = code.and_then(Currency::from_code) {
        return currency;
    }
    if Currency::is_rupee_symbol(symbol) {
        return Currency::Inr;
    }
    Currency::from_symbol(symbol).unwrap_or(default_currency)
}

fn candidate(caps: &Captures<'_>, default_currency: Currency) -> Option<AmountMatch> {
    let digits = caps.get(2)?.as_str();
    let amount = parse_amount(digits)?;
    let symbol = caps.get(1).map_or("", |m| m.as_str());
    let code = caps.get(3).map(|m| m.as_str());

    let currency = resolve_currency(symbol, code, default_currency);
    let original = format!("{}{} {}", symbol, digits, code.unwrap_or(""));

    Some(AmountMatch::new(amount, currency, original.trim()))
}
