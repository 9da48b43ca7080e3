//! Checkout page classification.

use lazy_static::lazy_static;
use tracing::{debug, warn};

use super::patterns::{CARD_INPUT_HINT, CHECKOUT_TEXT, CHECKOUT_URL};
use crate::models::ClassifierConfig;
use crate::page::{Page, Selector, SelectorList};

lazy_static! {
    static ref INPUTS: SelectorList = Selector::tag("input").into();
}

/// Decide whether the page is a checkout or payment page.
///
/// Pure and idempotent. A page whose body is not rendered yet, or that fails
/// to answer a query, is not a checkout page; callers classify again later.
pub fn is_checkout_page(page: &impl Page, config: &ClassifierConfig) -> bool {
    let url = page.url().to_lowercase();

    if config
        .excluded_origins
        .iter()
        .any(|origin| !origin.is_empty() && url.contains(&origin.to_lowercase()))
    {
        debug!("Excluded origin: {}", url);
        return false;
    }

    let body_text = match page.body_text() {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("Body not rendered yet");
            String::new()
        }
        Err(e) => {
            warn!("Could not read page text: {}", e);
            return false;
        }
    };

    if CHECKOUT_URL.is_match(&url) {
        debug!("Checkout URL: {}", url);
        return true;
    }

    if CHECKOUT_TEXT.is_match(&body_text) {
        debug!("Checkout vocabulary in page text");
        return true;
    }

    let inputs = match page.query(&INPUTS) {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!("Could not query inputs: {}", e);
            return false;
        }
    };

    let card_input = inputs.iter().find(|input| {
        let attrs = format!(
            "{} {} {}",
            input.attr_or_empty("name"),
            input.id(),
            input.attr_or_empty("placeholder")
        );
        CARD_INPUT_HINT.is_match(&attrs)
    });

    if let Some(input) = card_input {
        debug!("Card input found: {}", input.describe());
        return true;
    }

    false
}
