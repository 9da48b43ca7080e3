//! Currency lexicon: symbols and ISO codes recognized on checkout pages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Currencies the extractor can resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "JPY")]
    Jpy,
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "CAD")]
    Cad,
    #[serde(rename = "AUD")]
    Aud,
    #[serde(rename = "CHF")]
    Chf,
    #[serde(rename = "SEK")]
    Sek,
    #[serde(rename = "BRL")]
    Brl,
}

/// Symbol table, longest symbols first so that `R$` wins over `$`.
const SYMBOLS: &[(&str, Currency)] = &[
    ("CHF", Currency::Chf),
    ("C$", Currency::Cad),
    ("A$", Currency::Aud),
    ("R$", Currency::Brl),
    ("Rs", Currency::Inr),
    ("kr", Currency::Sek),
    ("$", Currency::Usd),
    ("€", Currency::Eur),
    ("£", Currency::Gbp),
    ("¥", Currency::Jpy),
    ("₹", Currency::Inr),
];

impl Currency {
    /// Every currency in the lexicon.
    pub const ALL: [Currency; 10] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Inr,
        Currency::Cad,
        Currency::Aud,
        Currency::Chf,
        Currency::Sek,
        Currency::Brl,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
            Self::Inr => "INR",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Chf => "CHF",
            Self::Sek => "SEK",
            Self::Brl => "BRL",
        }
    }

    /// Parse an ISO code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    /// Resolve a price symbol such as `€`, `Rs` or `R$`.
    ///
    /// The lookup is exact (after trimming); alphabetic symbols match
    /// case-insensitively because page text is matched case-insensitively.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return None;
        }
        SYMBOLS
            .iter()
            .find(|(s, _)| *s == symbol || s.eq_ignore_ascii_case(symbol))
            .map(|(_, c)| *c)
    }

    /// Whether `symbol` is one of the Indian Rupee notations.
    pub fn is_rupee_symbol(symbol: &str) -> bool {
        let symbol = symbol.trim();
        symbol.eq_ignore_ascii_case("rs") || symbol.contains('₹')
    }

    /// Primary display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
            Self::Jpy => "¥",
            Self::Inr => "₹",
            Self::Cad => "C$",
            Self::Aud => "A$",
            Self::Chf => "CHF",
            Self::Sek => "kr",
            Self::Brl => "R$",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unsupported currency: {}", s))
    }
}

/// Detect a currency anywhere in free text.
///
/// Symbols are checked before codes, longest symbol first; alphabetic
/// symbols (`Rs`, `kr`, `CHF`) only count at word boundaries.
pub fn detect_currency(text: &str) -> Option<Currency> {
    for (symbol, currency) in SYMBOLS {
        let found = if symbol.chars().all(|c| c.is_ascii_alphabetic()) {
            contains_word(text, symbol)
        } else {
            text.contains(symbol)
        };
        if found {
            return Some(*currency);
        }
    }

    text.split(|c: char| !c.is_ascii_alphabetic())
        .find_map(Currency::from_code)
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_usd() {
        assert_eq!(Currency::default(), Currency::Usd);
        assert_eq!(
            serde_json::to_string(&Currency::default()).unwrap(),
            "\"USD\""
        );
    }

    #[test]
    fn test_from_symbol_resolves_every_symbol() {
        for (symbol, currency) in SYMBOLS {
            assert_eq!(Currency::from_symbol(symbol), Some(*currency), "{symbol}");
        }
    }

    #[test]
    fn test_multi_char_symbols_are_not_dollars() {
        assert_eq!(Currency::from_symbol("R$"), Some(Currency::Brl));
        assert_eq!(Currency::from_symbol("C$"), Some(Currency::Cad));
        assert_eq!(Currency::from_symbol("A$"), Some(Currency::Aud));
        assert_eq!(Currency::from_symbol("RS"), Some(Currency::Inr));
        assert_eq!(Currency::from_symbol(""), None);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Currency::from_code("eur"), Some(Currency::Eur));
        assert_eq!(Currency::from_code(" INR "), Some(Currency::Inr));
        assert_eq!(Currency::from_code("XYZ"), None);
        assert_eq!("SEK".parse::<Currency>(), Ok(Currency::Sek));
    }

    #[test]
    fn test_rupee_symbols() {
        assert!(Currency::is_rupee_symbol("Rs"));
        assert!(Currency::is_rupee_symbol("rs"));
        assert!(Currency::is_rupee_symbol("₹"));
        assert!(!Currency::is_rupee_symbol("R$"));
    }

    #[test]
    fn test_detect_currency() {
        assert_eq!(detect_currency("Total 25,00 €"), Some(Currency::Eur));
        assert_eq!(detect_currency("Price R$ 40"), Some(Currency::Brl));
        assert_eq!(detect_currency("Order total 99 GBP"), Some(Currency::Gbp));
        assert_eq!(detect_currency("Ukraine shipping 12"), None);
        assert_eq!(detect_currency("12 kr"), Some(Currency::Sek));
    }

    #[test]
    fn test_serde_uses_iso_codes() {
        let json = serde_json::to_string(&Currency::Inr).unwrap();
        assert_eq!(json, "\"INR\"");
        let parsed: Currency = serde_json::from_str("\"BRL\"").unwrap();
        assert_eq!(parsed, Currency::Brl);
    }
}
