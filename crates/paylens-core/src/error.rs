//! Error types for the paylens-core library.
//!
//! Extraction misses are not errors: extractors return `Option` and callers
//! proceed without the value. The enums below cover the failures that cross
//! a boundary (the host page, the rate service, the session window).

use thiserror::Error;

/// Main error type for the paylens library.
#[derive(Error, Debug)]
pub enum PaylensError {
    /// Host page access error.
    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// Exchange-rate lookup error.
    #[error("rate error: {0}")]
    Rate(#[from] RateError),

    /// Cross-window message error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session lifecycle error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while reading or writing the host page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The document (or its body) is not available yet.
    #[error("document not ready")]
    NotReady,

    /// The page rejected a selector.
    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },

    /// An element handle did not resolve to an element on this page.
    #[error("unknown element handle {0}")]
    UnknownElement(usize),

    /// Setting a field value or dispatching an event failed.
    #[error("DOM interaction failed: {0}")]
    Interaction(String),

    /// The page URL could not be parsed.
    #[error("invalid page URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors from the exchange-rate lookup.
#[derive(Error, Debug)]
pub enum RateError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body was not the expected shape.
    #[error("malformed rate response: {0}")]
    Malformed(String),

    /// The service reported a failure in its payload.
    #[error("rate lookup for {base} reported {result}")]
    Unsuccessful { base: String, result: String },

    /// The response did not carry the requested target rate.
    #[error("no {target} rate for base {base}")]
    MissingRate { base: String, target: String },
}

/// Errors validating a cross-window message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The sender's origin is not on the allow-list.
    #[error("untrusted origin: {0}")]
    UntrustedOrigin(String),

    /// The payload did not match any known message shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A field of a well-formed message failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Errors from the session lifecycle and the session window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The requested action is not valid in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    /// The session window could not be opened (e.g. blocked popup).
    #[error("session window could not be opened: {0}")]
    OpenFailed(String),

    /// The session window was closed by the user.
    #[error("session window is closed")]
    WindowClosed,

    /// Posting a message to the session window failed.
    #[error("failed to post message: {0}")]
    PostFailed(String),

    /// A pay attempt finished after navigation or a newer attempt.
    #[error("pay attempt superseded, session is {state}")]
    Superseded { state: String },

    /// The opener URL is invalid.
    #[error("invalid opener URL {url}: {reason}")]
    InvalidOpenerUrl { url: String, reason: String },
}

/// Result type for the paylens library.
pub type Result<T> = std::result::Result<T, PaylensError>;
