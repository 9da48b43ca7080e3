//! Merchant identification from the page URL and title.

use tracing::{debug, warn};
use url::Url;

use crate::error::PageError;
use crate::models::MerchantInfo;
use crate::page::Page;

/// Titles longer than this are not used as the merchant name.
const MAX_NAME_LEN: usize = 50;

/// Derive merchant identity. Never fails: any error yields
/// [`MerchantInfo::fallback`] for the current URL.
pub fn extract_merchant_data(page: &impl Page) -> MerchantInfo {
    let url = page.url();
    match identify(page, &url) {
        Ok(merchant) => {
            debug!("Merchant: {} ({})", merchant.name, merchant.domain);
            merchant
        }
        Err(e) => {
            warn!("Could not identify merchant, using fallback: {}", e);
            MerchantInfo::fallback(url)
        }
    }
}

fn identify(page: &impl Page, url: &str) -> Result<MerchantInfo, PageError> {
    let parsed = Url::parse(url).map_err(|e| PageError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| PageError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        })?;
    let domain = host.strip_prefix("www.").unwrap_or(host).to_string();

    let title = page.title()?;
    let name = title.split('|').next().unwrap_or("").trim();
    let name = if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        domain.split('.').next().unwrap_or("").to_uppercase()
    } else {
        name.to_string()
    };

    Ok(MerchantInfo {
        name,
        domain,
        url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HtmlPage;
    use pretty_assertions::assert_eq;

    fn merchant(url: &str, title: &str) -> MerchantInfo {
        let html = format!("<html><head><title>{}</title></head><body></body></html>", title);
        extract_merchant_data(&HtmlPage::parse(url, &html))
    }

    #[test]
    fn test_name_from_title() {
        let m = merchant("https://www.grandhotel.example/book", "Grand Hotel | Checkout");
        assert_eq!(
            m,
            MerchantInfo {
                name: "Grand Hotel".to_string(),
                domain: "grandhotel.example".to_string(),
                url: "https://www.grandhotel.example/book".to_string(),
            }
        );
    }

    #[test]
    fn test_long_title_uses_domain_label() {
        let title = "Secure checkout for your upcoming stay with a very long page title";
        let m = merchant("https://booking.example.com/pay", title);
        assert_eq!(m.name, "BOOKING");
        assert_eq!(m.domain, "booking.example.com");
    }

    #[test]
    fn test_empty_title_uses_domain_label() {
        let m = merchant("https://www.shop.example/", "");
        assert_eq!(m.name, "SHOP");
    }

    #[test]
    fn test_unparsable_url_falls_back() {
        let m = merchant("not a url", "Shop");
        assert!(m.is_fallback());
        assert_eq!(m.url, "not a url");
    }

    #[test]
    fn test_url_without_host_falls_back() {
        let m = merchant("data:text/html,hello", "Shop");
        assert_eq!(m.name, MerchantInfo::FALLBACK_NAME);
        assert_eq!(m.domain, MerchantInfo::FALLBACK_DOMAIN);
    }
}
