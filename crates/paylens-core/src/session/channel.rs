//! Origin allow-list for cross-window messages.

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::message::InboundMessage;
use crate::error::ProtocolError;

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginRule {
    /// Exact `scheme://host[:port]`.
    Exact(String),
    /// `scheme://host:*`, any port.
    AnyPort { scheme: String, host: String },
}

impl OriginRule {
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim().trim_end_matches('/');
        if let Some(prefix) = entry.strip_suffix(":*") {
            let url = Url::parse(prefix).ok()?;
            return Some(Self::AnyPort {
                scheme: url.scheme().to_string(),
                host: url.host_str()?.to_ascii_lowercase(),
            });
        }
        let url = Url::parse(entry).ok()?;
        Some(Self::Exact(url.origin().ascii_serialization()))
    }

    fn matches(&self, origin: &Url) -> bool {
        match self {
            Self::Exact(expected) => origin.origin().ascii_serialization() == *expected,
            Self::AnyPort { scheme, host } => {
                origin.scheme() == scheme
                    && origin.host_str().map(str::to_ascii_lowercase).as_deref() == Some(host)
            }
        }
    }
}

/// Validates sender origins and message shapes before the orchestrator
/// sees them.
#[derive(Debug, Clone, Default)]
pub struct TrustedChannel {
    rules: Vec<OriginRule>,
}

impl TrustedChannel {
    /// Build from allow-list entries. Unparsable entries are skipped.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = origins
            .into_iter()
            .filter_map(|entry| {
                let rule = OriginRule::parse(entry.as_ref());
                if rule.is_none() {
                    debug!("Skipping unparsable trusted origin {}", entry.as_ref());
                }
                rule
            })
            .collect();
        Self { rules }
    }

    pub fn is_trusted(&self, origin: &str) -> bool {
        match Url::parse(origin) {
            Ok(url) => self.rules.iter().any(|rule| rule.matches(&url)),
            Err(_) => false,
        }
    }

    /// Check the origin, then parse the payload.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UntrustedOrigin`] before the payload is looked at,
    /// otherwise whatever [`InboundMessage::from_value`] reports.
    pub fn accept(&self, origin: &str, data: Value) -> Result<InboundMessage, ProtocolError> {
        if !self.is_trusted(origin) {
            return Err(ProtocolError::UntrustedOrigin(origin.to_string()));
        }
        InboundMessage::from_value(data)
    }
}
