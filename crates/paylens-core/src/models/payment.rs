//! Records produced by the extraction pipeline and exchanged with the
//! session window.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::currency::Currency;

/// Merchant identity derived from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantInfo {
    /// Display name.
    pub name: String,

    /// Host name without a leading `www.`.
    pub domain: String,

    /// Full page URL.
    pub url: String,
}

impl MerchantInfo {
    /// Name used when nothing could be derived.
    pub const FALLBACK_NAME: &'static str = "MERCHANT";

    /// Domain used when nothing could be derived.
    pub const FALLBACK_DOMAIN: &'static str = "unknown.com";

    /// The fixed record returned when merchant extraction fails.
    pub fn fallback(url: impl Into<String>) -> Self {
        Self {
            name: Self::FALLBACK_NAME.to_string(),
            domain: Self::FALLBACK_DOMAIN.to_string(),
            url: url.into(),
        }
    }

    /// Whether this is the fallback record.
    pub fn is_fallback(&self) -> bool {
        self.name == Self::FALLBACK_NAME && self.domain == Self::FALLBACK_DOMAIN
    }
}

/// One candidate total found in page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountMatch {
    /// Strictly positive amount.
    pub amount: Decimal,

    /// Resolved currency.
    pub currency_code: Currency,

    /// The text the amount was read from.
    pub original_text: String,
}

impl AmountMatch {
    pub fn new(amount: Decimal, currency_code: Currency, original_text: impl Into<String>) -> Self {
        Self {
            amount,
            currency_code,
            original_text: original_text.into(),
        }
    }
}

/// Product or booking metadata. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Absolute image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub additional_info: Vec<String>,
}

impl ProductDetails {
    /// Check if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.location.is_none()
            && self.rating.is_none()
            && self.check_in.is_none()
            && self.check_out.is_none()
            && self.duration.is_none()
            && self.image.is_none()
            && self.additional_info.is_empty()
    }
}

/// Normalized payment request handed to the session opener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentContext {
    /// Amount in the reference currency; absent when no total was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_amount: Option<Decimal>,

    /// The authoritative total the amount was derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<AmountMatch>,

    pub merchant: MerchantInfo,
}

impl PaymentContext {
    /// Context for a page where no total was found.
    pub fn without_amount(merchant: MerchantInfo) -> Self {
        Self {
            usd_amount: None,
            original_amount: None,
            merchant,
        }
    }

    /// Context derived from the selected total.
    pub fn from_match(usd_amount: Decimal, original: AmountMatch, merchant: MerchantInfo) -> Self {
        Self {
            usd_amount: Some(usd_amount),
            original_amount: Some(original),
            merchant,
        }
    }

    /// Original amount text when the source currency differs from `reference`.
    pub fn foreign_original(&self, reference: Currency) -> Option<&str> {
        self.original_amount
            .as_ref()
            .filter(|m| m.currency_code != reference)
            .map(|m| m.original_text.as_str())
    }
}

/// Virtual card issued for the session.
///
/// `Debug` is redacted; the PAN and CVV never reach a log line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCredential {
    #[serde(alias = "number", alias = "cardNumber")]
    pub pan: String,

    #[serde(alias = "cvc", alias = "securityCode")]
    pub cvv: String,

    /// Accepts `6` or `"06"`.
    #[serde(alias = "exp_month", deserialize_with = "number_or_digits")]
    pub exp_month: u32,

    #[serde(alias = "exp_year", deserialize_with = "number_or_digits")]
    pub exp_year: i32,

    #[serde(default, alias = "cardholder_name", skip_serializing_if = "Option::is_none")]
    pub cardholder_name: Option<String>,
}

impl CardCredential {
    /// Check the credential is usable for filling.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let digits: String = self.pan.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            issues.push("pan must contain only digits".to_string());
        }
        if self.cvv.is_empty() || !self.cvv.chars().all(|c| c.is_ascii_digit()) {
            issues.push("cvv must contain only digits".to_string());
        }
        if !(1..=12).contains(&self.exp_month) {
            issues.push(format!("expMonth {} is not a month", self.exp_month));
        }
        if !(1000..=9999).contains(&self.exp_year) {
            issues.push(format!("expYear {} is not a 4-digit year", self.exp_year));
        }

        issues
    }

    /// Two-digit month, e.g. `07`.
    pub fn month_mm(&self) -> String {
        format!("{:02}", self.exp_month)
    }

    /// Last two digits of the year, e.g. `32` for 2032.
    pub fn year_yy(&self) -> String {
        format!("{:02}", self.exp_year.rem_euclid(100))
    }

    /// Combined `MM/YY` expiry.
    pub fn expiry_mm_yy(&self) -> String {
        format!("{}/{}", self.month_mm(), self.year_yy())
    }

    /// Last four digits of the PAN.
    pub fn last4(&self) -> &str {
        let start = self.pan.len().saturating_sub(4);
        self.pan.get(start..).unwrap_or("")
    }
}

fn number_or_digits<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<i64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => T::try_from(n).map_err(|_| de::Error::custom("number out of range")),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom("expected digits")),
    }
}

impl fmt::Debug for CardCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardCredential")
            .field("pan", &format_args!("**** {}", self.last4()))
            .field("cvv", &"***")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cardholder_name", &self.cardholder_name.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Data shown on the confirmation overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    pub transaction_id: String,

    /// Amount paid in the reference currency.
    pub amount: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<String>,

    pub merchant: String,

    pub domain: String,

    pub paid_at: DateTime<Utc>,

    pub payment_method: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDetails>,
}

impl ConfirmationSummary {
    /// Amount formatted for display, e.g. `$44.50`.
    pub fn display_amount(&self) -> String {
        format!("${:.2}", self.amount.round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn card() -> CardCredential {
        CardCredential {
            pan: "4111111111111111".to_string(),
            cvv: "123".to_string(),
            exp_month: 7,
            exp_year: 2032,
            cardholder_name: Some("Ada Lovelace".to_string()),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", card());
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("123"));
        assert!(!debug.contains("Ada"));
        assert!(debug.contains("1111"));
    }

    #[test]
    fn test_expiry_formats() {
        let card = card();
        assert_eq!(card.month_mm(), "07");
        assert_eq!(card.year_yy(), "32");
        assert_eq!(card.expiry_mm_yy(), "07/32");
    }

    #[test]
    fn test_credential_accepts_wire_aliases() {
        let json = r#"{"pan":"4242424242424242","cvv":"999","exp_month":12,"exp_year":2030,"cardholder_name":"Jo"}"#;
        let card: CardCredential = serde_json::from_str(json).unwrap();
        assert_eq!(card.exp_month, 12);
        assert_eq!(card.cardholder_name.as_deref(), Some("Jo"));

        let json = r#"{"number":"4242424242424242","cvc":"999","expMonth":1,"expYear":2031}"#;
        let card: CardCredential = serde_json::from_str(json).unwrap();
        assert_eq!(card.pan, "4242424242424242");
        assert!(card.cardholder_name.is_none());
    }

    #[test]
    fn test_credential_accepts_string_expiry() {
        let json = r#"{"pan":"4111111111111111","cvv":"123","exp_month":"06","exp_year":"2030"}"#;
        let card: CardCredential = serde_json::from_str(json).unwrap();
        assert_eq!(card.exp_month, 6);
        assert_eq!(card.exp_year, 2030);
        assert_eq!(card.expiry_mm_yy(), "06/30");
        assert!(card.validate().is_empty());

        let json = r#"{"pan":"4111111111111111","cvv":"123","expMonth":"June","expYear":2030}"#;
        assert!(serde_json::from_str::<CardCredential>(json).is_err());

        let json = r#"{"pan":"4111111111111111","cvv":"123","expMonth":-1,"expYear":2030}"#;
        assert!(serde_json::from_str::<CardCredential>(json).is_err());
    }

    #[test]
    fn test_validate_credential() {
        assert!(card().validate().is_empty());

        let mut bad = card();
        bad.exp_month = 13;
        bad.exp_year = 32;
        let issues = bad.validate();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_foreign_original_only_for_other_currencies() {
        let merchant = MerchantInfo::fallback("https://shop.example/");
        let inr = AmountMatch::new(Decimal::from(1250), Currency::Inr, "Rs1,250");
        let ctx = PaymentContext::from_match(Decimal::from_str("15.00").unwrap(), inr, merchant.clone());
        assert_eq!(ctx.foreign_original(Currency::Usd), Some("Rs1,250"));

        let usd = AmountMatch::new(Decimal::from(15), Currency::Usd, "$15");
        let ctx = PaymentContext::from_match(Decimal::from(15), usd, merchant);
        assert_eq!(ctx.foreign_original(Currency::Usd), None);
    }

    #[test]
    fn test_product_details_is_empty() {
        assert!(ProductDetails::default().is_empty());
        let details = ProductDetails {
            rating: Some("8.9 Excellent".to_string()),
            ..Default::default()
        };
        assert!(!details.is_empty());
    }
}
