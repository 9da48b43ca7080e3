//! Heuristic extractors for checkout pages.
//!
//! Every extractor degrades to an absent value: a miss is `None` (or the
//! merchant fallback record), never an error.

pub mod amount;
pub mod classifier;
pub mod merchant;
pub mod patterns;
pub mod product;

pub use amount::{
    extract_total_amount, extract_total_amount_from_text, parse_amount, resolve_currency,
    AmountExtractor, AmountRule, Pick, AMOUNT_RULES,
};
pub use classifier::is_checkout_page;
pub use merchant::extract_merchant_data;
pub use product::extract_product_details;
