//! Core library for checkout page understanding.
//!
//! This crate provides:
//! - Checkout page classification
//! - Total amount extraction with currency resolution
//! - Merchant and product/booking metadata extraction
//! - Currency normalization through an exchange-rate service
//! - Payment card field autofill
//! - The payment session state machine and its message channel

pub mod analyze;
pub mod currency;
pub mod error;
pub mod extract;
pub mod fill;
pub mod models;
pub mod page;
pub mod rates;
pub mod session;

pub use analyze::{AnalysisResult, CheckoutAnalyzer, PageReport};
pub use currency::{detect_currency, Currency};
pub use error::{PageError, PaylensError, ProtocolError, RateError, Result, SessionError};
pub use extract::{
    extract_merchant_data, extract_product_details, extract_total_amount,
    extract_total_amount_from_text, is_checkout_page, AmountExtractor,
};
pub use fill::{autofill, ExpiryMode, FieldBinding, FieldRole, FillReport};
pub use models::{
    AmountMatch, CardCredential, ConfirmationSummary, MerchantInfo, PaylensConfig, PaymentContext,
    ProductDetails,
};
pub use page::{ElementHandle, FieldEvent, FormHost, HtmlPage, Page, PageElement, Selector, SelectorList};
pub use rates::{CurrencyConverter, HttpRateSource, RateSource, RateTable};
pub use session::{
    Affordance, ConfirmOutcome, InboundMessage, MessageOutcome, NoticeKind, Orchestrator,
    OutboundMessage, PendingPayment, SessionState, SessionWindow, Surface, TickOutcome,
    TrustedChannel,
};
