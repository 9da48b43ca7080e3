//! One-shot page analysis: everything the extractors can tell about a page.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extract::{extract_merchant_data, extract_product_details, is_checkout_page, AmountExtractor};
use crate::models::{AmountMatch, ClassifierConfig, MerchantInfo, PaylensConfig, ProductDetails};
use crate::page::Page;

/// What the extractors found on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub url: String,
    pub is_checkout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountMatch>,
    pub merchant: MerchantInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductDetails>,
}

/// Analysis result with diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub report: PageReport,

    /// Extraction misses worth reporting.
    pub warnings: Vec<String>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Runs every extractor against a page.
#[derive(Debug, Clone)]
pub struct CheckoutAnalyzer {
    classifier: ClassifierConfig,
    amounts: AmountExtractor,
}

impl CheckoutAnalyzer {
    pub fn new(config: &PaylensConfig) -> Self {
        Self {
            classifier: config.classifier.clone(),
            amounts: AmountExtractor::new(config.extraction.default_currency),
        }
    }

    pub fn analyze(&self, page: &impl Page) -> AnalysisResult {
        let start = Utc::now();
        let mut warnings = Vec::new();

        let is_checkout = is_checkout_page(page, &self.classifier);
        if !is_checkout {
            warnings.push("Page does not look like a checkout page".to_string());
        }

        let amount = self.amounts.extract_from_page(page);
        if amount.is_none() {
            warnings.push("Could not extract total amount".to_string());
        }

        let merchant = extract_merchant_data(page);
        if merchant.is_fallback() {
            warnings.push("Could not identify merchant".to_string());
        }

        let product = extract_product_details(page).filter(|p| !p.is_empty());
        if product.is_none() {
            warnings.push("No product details found".to_string());
        }

        let processing_time_ms = u64::try_from((Utc::now() - start).num_milliseconds()).unwrap_or(0);
        info!(
            "Analyzed {} in {}ms ({} warnings)",
            page.url(),
            processing_time_ms,
            warnings.len()
        );

        AnalysisResult {
            report: PageReport {
                url: page.url(),
                is_checkout,
                amount,
                merchant,
                product,
            },
            warnings,
            processing_time_ms,
        }
    }
}

impl Default for CheckoutAnalyzer {
    fn default() -> Self {
        Self::new(&PaylensConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::page::HtmlPage;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_hotel_checkout() {
        let html = r#"<html><head><title>Seaside Resort | Secure booking</title></head>
            <body>
              <h1>Seaside Resort and Spa</h1>
              <p>Check-in: Friday, March 14, 2025</p>
              <p>Check-out: Sunday, March 16, 2025</p>
              <p>2 nights, 1 room</p>
              <div class="price-total">Total: €310.00</div>
              <input name="cardnumber" placeholder="Card number">
            </body></html>"#;
        let page = HtmlPage::parse("https://www.seaside.example/book/payment", html);
        let result = CheckoutAnalyzer::default().analyze(&page);

        assert!(result.report.is_checkout);
        let amount = result.report.amount.unwrap();
        assert_eq!(amount.amount, Decimal::new(31000, 2));
        assert_eq!(amount.currency_code, Currency::Eur);
        assert_eq!(result.report.merchant.name, "Seaside Resort");
        assert_eq!(result.report.merchant.domain, "seaside.example");

        let product = result.report.product.unwrap();
        assert_eq!(product.product_name.as_deref(), Some("Seaside Resort and Spa"));
        assert_eq!(product.duration.as_deref(), Some("2 nights, 1 room"));
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_plain_page_warns() {
        let page = HtmlPage::parse("https://blog.example/post", "<p>Nothing to buy</p>");
        let result = CheckoutAnalyzer::default().analyze(&page);

        assert!(!result.report.is_checkout);
        assert!(result.report.amount.is_none());
        assert!(result.report.product.is_none());
        assert_eq!(
            result.warnings,
            vec![
                "Page does not look like a checkout page",
                "Could not extract total amount",
                "No product details found",
            ]
        );
    }
}
