//! Payment session orchestration.
//!
//! The [`Orchestrator`] owns every piece of per-page state: the payment
//! context handed to the session window, the product details shown on the
//! confirmation, and the card credential between its arrival and the fill.
//! Hosts drive it with page events and run the delays it hands back.

pub mod channel;
pub mod message;
mod surface;

pub use channel::TrustedChannel;
pub use message::{InboundMessage, OutboundMessage, PaymentDetails};
pub use surface::{
    Affordance, NoticeKind, RecordingSurface, RecordingWindow, SessionWindow, Surface,
    SurfaceEvent,
};

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SessionError;
use crate::extract::{extract_merchant_data, extract_product_details, is_checkout_page, AmountExtractor};
use crate::fill::{autofill, FillReport};
use crate::models::{
    AmountMatch, CardCredential, ConfirmationSummary, MerchantInfo, PaylensConfig,
    PaymentContext, ProductDetails,
};
use crate::page::{FormHost, Page};
use crate::rates::{CurrencyConverter, RateSource};

/// Loading message while the amount is converted.
pub const LOADING_ACCEPTING: &str = "Accepting crypto";

/// Loading message while a confirmation is in flight.
pub const LOADING_CONFIRMING: &str = "Confirming transaction";

/// Payment method label on the confirmation.
pub const PAYMENT_METHOD: &str = "Crypto via virtual card";

/// Lifecycle of one page's payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Judged a checkout page; the pay affordance is shown.
    Classified,
    Extracting,
    /// Session window open, waiting for the credential.
    AwaitingSession,
    /// Credential stored, fill pending.
    AwaitingCredential,
    /// Form filled, waiting for the payment result.
    Filled,
    Confirmed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classified => "classified",
            Self::Extracting => "extracting",
            Self::AwaitingSession => "awaiting_session",
            Self::AwaitingCredential => "awaiting_credential",
            Self::Filled => "filled",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host should do after an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Nothing changed.
    Ignored { reason: String },
    /// Call [`Orchestrator::fill`] after the delay.
    FillScheduled { delay: Duration },
    /// The confirmation was rendered.
    Confirmed { summary: ConfirmationSummary },
}

/// Result of a confirm click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Posted to the open session window.
    Sent,
    /// The window was gone and has been reopened; call
    /// [`Orchestrator::resend_confirmation`] after the delay.
    Reopened { retry_after: Duration },
}

/// Result of a timeout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Nothing,
    /// The session window never delivered; back to the pay affordance.
    SessionExpired,
    /// A confirmation got no answer; the confirm affordance is back.
    ConfirmationExpired,
}

/// A pay action between [`Orchestrator::begin_payment`] and
/// [`Orchestrator::finish_payment`].
#[derive(Debug, Clone)]
pub struct PendingPayment {
    attempt: u64,
    total: Option<AmountMatch>,
    merchant: MerchantInfo,
    product: Option<ProductDetails>,
}

impl PendingPayment {
    /// The selected total in its page currency.
    pub fn total(&self) -> Option<&AmountMatch> {
        self.total.as_ref()
    }

    /// The total in the converter's reference currency, if there is one.
    pub async fn normalize<R: RateSource>(
        &self,
        converter: &CurrencyConverter<R>,
    ) -> Option<Decimal> {
        match &self.total {
            Some(total) => Some(converter.convert_to_usd(total.amount, total.currency_code).await),
            None => None,
        }
    }
}

/// Drives a page from classification to the payment confirmation.
pub struct Orchestrator<R> {
    config: PaylensConfig,
    channel: TrustedChannel,
    converter: CurrencyConverter<R>,
    amounts: AmountExtractor,
    state: SessionState,
    state_since: Option<DateTime<Utc>>,
    context: Option<PaymentContext>,
    product: Option<ProductDetails>,
    credential: Option<CardCredential>,
    pending_confirmation: Option<OutboundMessage>,
    confirmation_sent_at: Option<DateTime<Utc>>,
    attempt: u64,
}

impl<R: RateSource> Orchestrator<R> {
    pub fn new(config: PaylensConfig, source: R) -> Self {
        let channel = TrustedChannel::new(&config.session.trusted_origins);
        let converter = CurrencyConverter::with_reference(source, config.extraction.reference_currency);
        let amounts = AmountExtractor::new(config.extraction.default_currency);
        Self {
            config,
            channel,
            converter,
            amounts,
            state: SessionState::Idle,
            state_since: None,
            context: None,
            product: None,
            credential: None,
            pending_confirmation: None,
            confirmation_sent_at: None,
            attempt: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &PaylensConfig {
        &self.config
    }

    /// Context handed to the session window, while a session is live.
    pub fn context(&self) -> Option<&PaymentContext> {
        self.context.as_ref()
    }

    pub fn product(&self) -> Option<&ProductDetails> {
        self.product.as_ref()
    }

    /// Whether a credential is held in memory.
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Delay before the host classifies the page a second time.
    pub fn reclassify_delay(&self) -> Duration {
        Duration::from_millis(self.config.session.reclassify_delay_ms)
    }

    /// Classify the page. Only promotes `Idle` to `Classified`.
    pub fn classify<P, S>(&mut self, page: &P, surface: &mut S) -> bool
    where
        P: Page,
        S: Surface + ?Sized,
    {
        let is_checkout = is_checkout_page(page, &self.config.classifier);
        if is_checkout && self.state == SessionState::Idle {
            info!("Checkout page detected: {}", page.url());
            self.transition(SessionState::Classified, None);
            surface.set_affordance(Affordance::Pay);
        } else {
            debug!("Classified {} as checkout={} while {}", page.url(), is_checkout, self.state);
        }
        is_checkout
    }

    /// The pay action: extract, normalize, open the session window.
    ///
    /// Runs [`begin_payment`](Self::begin_payment), the conversion and
    /// [`finish_payment`](Self::finish_payment) back to back. Hosts that
    /// must keep handling events during the rate lookup call the three
    /// steps themselves.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] outside `Classified`; an opener
    /// URL or window failure returns the orchestrator to `Classified`.
    pub async fn pay<P, S, W>(
        &mut self,
        page: &P,
        surface: &mut S,
        window: &mut W,
        now: DateTime<Utc>,
    ) -> Result<PaymentContext, SessionError>
    where
        P: Page,
        S: Surface + ?Sized,
        W: SessionWindow + ?Sized,
    {
        let pending = self.begin_payment(page, surface, now)?;
        let usd_amount = pending.normalize(&self.converter).await;
        self.finish_payment(pending, usd_amount, surface, window, now)
    }

    /// First pay step: read the page and enter `Extracting`.
    ///
    /// Shows the loading overlay when a total was found.
    pub fn begin_payment<P, S>(
        &mut self,
        page: &P,
        surface: &mut S,
        now: DateTime<Utc>,
    ) -> Result<PendingPayment, SessionError>
    where
        P: Page,
        S: Surface + ?Sized,
    {
        self.require(SessionState::Classified, "pay")?;
        self.transition(SessionState::Extracting, Some(now));
        self.attempt += 1;

        let merchant = extract_merchant_data(page);
        let product = extract_product_details(page);
        let total = self.amounts.extract_from_page(page);

        match &total {
            Some(total) => {
                info!("Total {} {} at {}", total.amount, total.currency_code, merchant.domain);
                surface.show_loading(LOADING_ACCEPTING);
            }
            None => warn!("No total found on {}, opening session without an amount", page.url()),
        }

        Ok(PendingPayment {
            attempt: self.attempt,
            total,
            merchant,
            product,
        })
    }

    /// Last pay step: open the session window for a converted payment.
    ///
    /// # Errors
    ///
    /// [`SessionError::Superseded`] when the page navigated or another
    /// attempt started since `pending` was begun; the orchestrator and
    /// surface are left alone. Opener URL and window failures return the
    /// orchestrator to `Classified`.
    pub fn finish_payment<S, W>(
        &mut self,
        pending: PendingPayment,
        usd_amount: Option<Decimal>,
        surface: &mut S,
        window: &mut W,
        now: DateTime<Utc>,
    ) -> Result<PaymentContext, SessionError>
    where
        S: Surface + ?Sized,
        W: SessionWindow + ?Sized,
    {
        if self.state != SessionState::Extracting || self.attempt != pending.attempt {
            debug!("Dropping pay attempt {} while {}", pending.attempt, self.state);
            return Err(SessionError::Superseded { state: self.state.to_string() });
        }

        let PendingPayment { total, merchant, product, .. } = pending;
        if total.is_some() {
            surface.hide_loading();
        }
        let context = match (total, usd_amount) {
            (Some(total), Some(usd)) => PaymentContext::from_match(usd, total, merchant),
            _ => PaymentContext::without_amount(merchant),
        };

        let opened = self
            .session_url(&context)
            .and_then(|url| window.open(&url));
        if let Err(e) = opened {
            warn!("Could not open the session window: {}", e);
            self.transition(SessionState::Classified, None);
            surface.notify("Could not open the payment window", NoticeKind::Error);
            return Err(e);
        }

        self.context = Some(context.clone());
        self.product = product;
        self.transition(SessionState::AwaitingSession, Some(now));
        Ok(context)
    }

    /// Converter used for the pay action's normalization.
    pub fn converter(&self) -> &CurrencyConverter<R> {
        &self.converter
    }

    /// Route a cross-window message. Never fails; rejected messages are
    /// logged and reported as [`MessageOutcome::Ignored`].
    pub fn handle_message<S>(
        &mut self,
        surface: &mut S,
        origin: &str,
        data: Value,
        now: DateTime<Utc>,
    ) -> MessageOutcome
    where
        S: Surface + ?Sized,
    {
        let message = match self.channel.accept(origin, data) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring message: {}", e);
                return MessageOutcome::Ignored { reason: e.to_string() };
            }
        };

        match message {
            InboundMessage::CredentialReady { card } => {
                if self.state != SessionState::AwaitingSession {
                    return self.ignore("CREDENTIAL_READY");
                }
                info!("Card credential received");
                self.credential = Some(card);
                self.transition(SessionState::AwaitingCredential, Some(now));
                MessageOutcome::FillScheduled {
                    delay: Duration::from_millis(self.config.session.fill_delay_ms),
                }
            }
            InboundMessage::PaymentComplete { payment_details } => {
                if self.state != SessionState::Filled {
                    return self.ignore("PAYMENT_COMPLETE");
                }
                let summary = self.summary(payment_details, now);
                surface.hide_loading();
                surface.show_confirmation(&summary);
                surface.set_affordance(Affordance::Hidden);
                info!("Payment {} complete", summary.transaction_id);

                self.pending_confirmation = None;
                self.confirmation_sent_at = None;
                self.transition(SessionState::Confirmed, Some(now));
                MessageOutcome::Confirmed { summary }
            }
        }
    }

    /// Fill the payment form with the stored credential, then drop it.
    pub fn fill<H, S>(
        &mut self,
        host: &mut H,
        surface: &mut S,
        now: DateTime<Utc>,
    ) -> Result<FillReport, SessionError>
    where
        H: FormHost,
        S: Surface + ?Sized,
    {
        self.require(SessionState::AwaitingCredential, "fill")?;
        let credential = self.credential.take().ok_or_else(|| SessionError::InvalidTransition {
            action: "fill".to_string(),
            state: "without a credential".to_string(),
        })?;

        let report = autofill(host, surface, &credential);
        drop(credential);

        surface.hide_loading();
        self.transition(SessionState::Filled, Some(now));
        Ok(report)
    }

    /// The confirm action: ask the session window to settle.
    pub fn confirm<W, S>(
        &mut self,
        window: &mut W,
        surface: &mut S,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, SessionError>
    where
        W: SessionWindow + ?Sized,
        S: Surface + ?Sized,
    {
        self.require(SessionState::Filled, "confirm")?;

        let message = OutboundMessage::ConfirmTransaction {
            timestamp: now.timestamp_millis(),
        };
        surface.show_loading(LOADING_CONFIRMING);
        surface.set_affordance(Affordance::Confirming);
        self.confirmation_sent_at = Some(now);

        if window.is_open() {
            match window.post(&message) {
                Ok(()) => {
                    info!("Confirmation sent to the session window");
                    return Ok(ConfirmOutcome::Sent);
                }
                Err(e) => warn!("Posting the confirmation failed, reopening: {}", e),
            }
        } else {
            warn!("Session window is gone, reopening");
        }

        let reopened = self.auto_payment_url().and_then(|url| window.open(&url));
        match reopened {
            Ok(()) => {
                self.pending_confirmation = Some(message);
                Ok(ConfirmOutcome::Reopened {
                    retry_after: Duration::from_millis(self.config.session.settle_delay_ms),
                })
            }
            Err(e) => {
                self.confirmation_sent_at = None;
                surface.hide_loading();
                surface.notify("Could not reach the payment window", NoticeKind::Error);
                surface.set_affordance(Affordance::Confirm);
                Err(e)
            }
        }
    }

    /// Send a confirmation deferred by [`ConfirmOutcome::Reopened`].
    /// Returns whether anything was sent.
    pub fn resend_confirmation<W>(&mut self, window: &mut W) -> Result<bool, SessionError>
    where
        W: SessionWindow + ?Sized,
    {
        match self.pending_confirmation.take() {
            Some(message) if self.state == SessionState::Filled => {
                window.post(&message)?;
                info!("Deferred confirmation sent");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Apply the session timeout.
    pub fn tick<S>(&mut self, surface: &mut S, now: DateTime<Utc>) -> TickOutcome
    where
        S: Surface + ?Sized,
    {
        let timeout = self.timeout_secs();
        let expired =
            |since: Option<DateTime<Utc>>| since.is_some_and(|t| (now - t).num_seconds() >= timeout);

        match self.state {
            SessionState::AwaitingSession | SessionState::AwaitingCredential
                if expired(self.state_since) =>
            {
                warn!("Session window did not answer while {}, resetting", self.state);
                self.clear_session();
                self.transition(SessionState::Classified, None);
                surface.hide_loading();
                surface.notify("Payment session timed out", NoticeKind::Error);
                surface.set_affordance(Affordance::Pay);
                TickOutcome::SessionExpired
            }
            SessionState::Filled if expired(self.confirmation_sent_at) => {
                warn!("Confirmation got no answer");
                self.pending_confirmation = None;
                self.confirmation_sent_at = None;
                surface.hide_loading();
                surface.set_affordance(Affordance::Confirm);
                TickOutcome::ConfirmationExpired
            }
            _ => TickOutcome::Nothing,
        }
    }

    /// Page navigation: discard everything and hide the injected UI.
    pub fn navigate<S>(&mut self, surface: &mut S)
    where
        S: Surface + ?Sized,
    {
        info!("Navigation while {}, resetting", self.state);
        self.reset();
        surface.hide_loading();
        surface.set_affordance(Affordance::Hidden);
    }

    /// Back to `Idle` with no context, product or credential.
    pub fn reset(&mut self) {
        self.clear_session();
        self.transition(SessionState::Idle, None);
    }

    /// Session window URL carrying the payment context.
    pub fn session_url(&self, context: &PaymentContext) -> Result<Url, SessionError> {
        let mut url = self.opener_url()?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(amount) = context.usd_amount {
                query.append_pair("amount", &amount.to_string());
                if let Some(original) = context.foreign_original(self.converter.reference()) {
                    query.append_pair("originalAmount", original);
                }
            }
            query.append_pair("merchant", &context.merchant.name);
            query.append_pair("domain", &context.merchant.domain);
        }
        Ok(url)
    }

    fn auto_payment_url(&self) -> Result<Url, SessionError> {
        let mut url = self.opener_url()?;
        url.query_pairs_mut().append_pair("autoPayment", "true");
        Ok(url)
    }

    fn opener_url(&self) -> Result<Url, SessionError> {
        let raw = &self.config.session.opener_url;
        Url::parse(raw).map_err(|e| SessionError::InvalidOpenerUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    fn summary(&self, details: PaymentDetails, now: DateTime<Utc>) -> ConfirmationSummary {
        ConfirmationSummary {
            transaction_id: transaction_id(now, &details.domain),
            amount: details.amount,
            original_amount: details.original_amount,
            merchant: details.merchant,
            domain: details.domain,
            paid_at: now,
            payment_method: PAYMENT_METHOD.to_string(),
            product: self.product.clone().filter(|p| !p.is_empty()),
        }
    }

    fn require(&self, expected: SessionState, action: &str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action: action.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    fn ignore(&self, kind: &str) -> MessageOutcome {
        debug!("Ignoring {} while {}", kind, self.state);
        MessageOutcome::Ignored {
            reason: format!("{} not expected while {}", kind, self.state),
        }
    }

    fn transition(&mut self, next: SessionState, now: Option<DateTime<Utc>>) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
        self.state_since = now;
    }

    fn clear_session(&mut self) {
        self.context = None;
        self.product = None;
        self.credential = None;
        self.pending_confirmation = None;
        self.confirmation_sent_at = None;
    }

    fn timeout_secs(&self) -> i64 {
        i64::try_from(self.config.session.session_timeout_secs).unwrap_or(i64::MAX)
    }
}

/// Display reference: `PL`, the millisecond timestamp and seven base-36
/// characters.
fn transaction_id(now: DateTime<Utc>, domain: &str) -> String {
    let mut hasher = DefaultHasher::new();
    now.timestamp_nanos_opt().unwrap_or_default().hash(&mut hasher);
    domain.hash(&mut hasher);
    let mut bits = hasher.finish();

    let mut suffix = String::with_capacity(7);
    for _ in 0..7 {
        let digit = (bits % 36) as u32;
        suffix.push(char::from_digit(digit, 36).unwrap_or('0').to_ascii_uppercase());
        bits /= 36;
    }
    format!("PL{}{}", now.timestamp_millis(), suffix)
}
