//! Ranked selector tables per field role.
//!
//! Within a role the ranks are tried in order; the first rank with any match
//! wins and its first element in document order is used. Month and year are
//! one rank each, so the first matching element in document order wins.

use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::page::{Selector, SelectorList};

/// Logical payment field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    CardNumber,
    /// Combined `MM/YY` field.
    Expiry,
    Month,
    Year,
    Cvv,
    Name,
}

impl FieldRole {
    pub const ALL: [FieldRole; 6] = [
        FieldRole::CardNumber,
        FieldRole::Expiry,
        FieldRole::Month,
        FieldRole::Year,
        FieldRole::Cvv,
        FieldRole::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardNumber => "card_number",
            Self::Expiry => "expiry",
            Self::Month => "month",
            Self::Year => "year",
            Self::Cvv => "cvv",
            Self::Name => "name",
        }
    }

    /// Whether values for this role must never be shown in clear.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::CardNumber | Self::Cvv)
    }

    /// Selector ranks for this role.
    pub fn ranks(&self) -> &'static [SelectorList] {
        match self {
            Self::CardNumber => CARD_NUMBER.as_slice(),
            Self::Expiry => EXPIRY.as_slice(),
            Self::Month => MONTH.as_slice(),
            Self::Year => YEAR.as_slice(),
            Self::Cvv => CVV.as_slice(),
            Self::Name => NAME.as_slice(),
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn input() -> Selector {
    Selector::tag("input")
}

fn ranks(selectors: Vec<Selector>) -> Vec<SelectorList> {
    selectors.into_iter().map(SelectorList::single).collect()
}

lazy_static! {
    static ref CARD_NUMBER: Vec<SelectorList> = ranks(vec![
        input().contains("name", "cardnumber"),
        input().contains("name", "card-number"),
        input().contains("name", "card_number"),
        input().contains("name", "ccnumber"),
        input().contains("name", "creditcard"),
        input().contains("id", "cardnumber"),
        input().contains("id", "card-number"),
        input().contains("id", "card_number"),
        input().contains("placeholder", "card number"),
        input().contains("placeholder", "card").contains("placeholder", "number"),
        input().equals("autocomplete", "cc-number"),
        input().equals("type", "tel").contains("name", "card"),
        input().equals("type", "text").contains("name", "card"),
    ]);

    static ref EXPIRY: Vec<SelectorList> = ranks(vec![
        input().contains("name", "expiry"),
        input().contains("name", "expiration"),
        input().contains("name", "exp").lacks("name", "cvv").lacks("name", "cvc"),
        input().contains("id", "expiry"),
        input().contains("id", "expiration"),
        input().contains("placeholder", "mm").contains("placeholder", "yy"),
        input().contains("placeholder", "expir"),
        input().equals("autocomplete", "cc-exp"),
    ]);

    static ref MONTH: Vec<SelectorList> = vec![SelectorList::new(vec![
        input().contains("name", "month"),
        Selector::tag("select").contains("name", "month"),
        input().equals("placeholder", "MM"),
        input().contains("aria-label", "month"),
    ])];

    static ref YEAR: Vec<SelectorList> = vec![SelectorList::new(vec![
        input().contains("name", "year"),
        Selector::tag("select").contains("name", "year"),
        input().equals("placeholder", "YY"),
        input().contains("aria-label", "year"),
    ])];

    static ref CVV: Vec<SelectorList> = ranks(vec![
        input().contains("name", "cvv"),
        input().contains("name", "cvc"),
        input().contains("name", "security"),
        input().contains("id", "cvv"),
        input().contains("id", "cvc"),
        input().contains("placeholder", "cvv"),
        input().contains("placeholder", "cvc"),
        input().contains("placeholder", "security"),
        input().equals("autocomplete", "cc-csc"),
    ]);

    static ref NAME: Vec<SelectorList> = ranks(vec![
        input().contains("name", "cardholder"),
        input().contains("name", "card-name"),
        input().contains("name", "card_name"),
        input().contains("name", "name").contains("name", "card"),
        input().contains("id", "cardholder"),
        input().contains("placeholder", "name on card"),
        input().contains("placeholder", "cardholder"),
        input().equals("autocomplete", "cc-name"),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_ranks() {
        for role in FieldRole::ALL {
            assert!(!role.ranks().is_empty(), "{role}");
        }
    }

    #[test]
    fn test_month_rank_renders_as_one_group() {
        assert_eq!(
            FieldRole::Month.ranks()[0].to_css(),
            "input[name*=\"month\" i], select[name*=\"month\" i], \
             input[placeholder=\"MM\"], input[aria-label*=\"month\" i]"
        );
    }

    #[test]
    fn test_exp_rank_excludes_security_codes() {
        assert_eq!(
            FieldRole::Expiry.ranks()[2].to_css(),
            "input[name*=\"exp\" i]:not([name*=\"cvv\" i]):not([name*=\"cvc\" i])"
        );
    }

    #[test]
    fn test_secret_roles() {
        assert!(FieldRole::CardNumber.is_secret());
        assert!(FieldRole::Cvv.is_secret());
        assert!(!FieldRole::Month.is_secret());
    }
}
