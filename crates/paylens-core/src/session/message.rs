//! Typed cross-window messages.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::CardCredential;

/// Payment result reported by the session window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Amount paid in the reference currency. Accepts a JSON number or string.
    pub amount: Decimal,

    pub merchant: String,

    pub domain: String,

    /// Original amount text when the page priced in another currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<String>,
}

/// Messages the session window sends to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    /// The virtual card is issued and ready to fill.
    CredentialReady { card: CardCredential },

    /// The payment went through.
    PaymentComplete {
        #[serde(rename = "paymentDetails")]
        payment_details: PaymentDetails,
    },
}

impl InboundMessage {
    /// Message type as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialReady { .. } => "CREDENTIAL_READY",
            Self::PaymentComplete { .. } => "PAYMENT_COMPLETE",
        }
    }

    /// Parse and validate a message payload.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] for an unknown shape,
    /// [`ProtocolError::Invalid`] when a known message carries bad values.
    pub fn from_value(data: Value) -> Result<Self, ProtocolError> {
        let message: Self = serde_json::from_value(data).map_err(|e| malformed(&e))?;
        message.validate()?;
        Ok(message)
    }

    /// Parse a JSON string.
    pub fn from_json(data: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(data).map_err(|e| malformed(&e))?;
        Self::from_value(value)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::CredentialReady { card } => {
                let issues = card.validate();
                if issues.is_empty() {
                    Ok(())
                } else {
                    Err(ProtocolError::Invalid {
                        field: "card".to_string(),
                        reason: issues.join("; "),
                    })
                }
            }
            Self::PaymentComplete { payment_details } => {
                if payment_details.amount < Decimal::ZERO {
                    Err(ProtocolError::Invalid {
                        field: "paymentDetails.amount".to_string(),
                        reason: format!("{} is negative", payment_details.amount),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Describe a decode failure without the offending value.
///
/// serde renders type and value mismatches with the value inline, which for a
/// credential is the card number itself. Only field and variant names and the
/// expected shape are kept.
fn malformed(e: &serde_json::Error) -> ProtocolError {
    let text = e.to_string();
    let names_only = ["missing field", "unknown field", "duplicate field", "unknown variant"];

    let reason = if names_only.iter().any(|p| text.starts_with(p)) {
        text
    } else if let Some((kind, rest)) = text.split_once(':').filter(|(kind, _)| {
        matches!(*kind, "invalid type" | "invalid value" | "invalid length")
    }) {
        match rest.split_once(", expected ") {
            Some((_, expected)) => format!("{}, expected {}", kind, expected),
            None => kind.to_string(),
        }
    } else {
        match e.classify() {
            serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
                format!("not valid JSON at line {} column {}", e.line(), e.column())
            }
            _ => "payload has the wrong shape".to_string(),
        }
    };

    ProtocolError::Malformed(reason)
}

/// Messages the page sends to the session window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// Ask the session window to settle the payment.
    ConfirmTransaction {
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },
}

impl OutboundMessage {
    pub fn to_value(&self) -> Value {
        match self {
            Self::ConfirmTransaction { timestamp } => serde_json::json!({
                "type": "CONFIRM_TRANSACTION",
                "timestamp": timestamp,
            }),
        }
    }
}
