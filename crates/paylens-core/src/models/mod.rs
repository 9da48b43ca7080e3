//! Data models shared by the extractors, the fill engine and the session.

pub mod config;
pub mod payment;

pub use config::{ClassifierConfig, ExtractionConfig, PaylensConfig, RateConfig, SessionConfig};
pub use payment::{
    AmountMatch, CardCredential, ConfirmationSummary, MerchantInfo, PaymentContext, ProductDetails,
};
