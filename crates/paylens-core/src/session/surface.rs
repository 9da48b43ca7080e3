//! Host-page presentation and the session window, as seen by the
//! orchestrator.

use serde::{Deserialize, Serialize};
use url::Url;

use super::message::OutboundMessage;
use crate::error::SessionError;
use crate::models::ConfirmationSummary;

/// The action button injected into the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Affordance {
    /// No button.
    Hidden,
    /// "Pay with crypto": starts a session.
    Pay,
    /// "Confirm transaction": asks the session window to settle.
    Confirm,
    /// Confirm button disabled while the confirmation is in flight.
    Confirming,
}

/// Notification style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// User-visible presentation on the host page.
///
/// Implementations swallow their own rendering failures; nothing here may
/// surface as an error to the host page.
pub trait Surface {
    /// Show the blocking loading overlay.
    fn show_loading(&mut self, message: &str);

    fn hide_loading(&mut self);

    /// Show a transient notification.
    fn notify(&mut self, message: &str, kind: NoticeKind);

    fn set_affordance(&mut self, affordance: Affordance);

    /// Render the payment confirmation overlay.
    fn show_confirmation(&mut self, summary: &ConfirmationSummary);
}

/// The external session window (the dashboard).
pub trait SessionWindow {
    /// Open (or re-target) the session window at `url`.
    fn open(&mut self, url: &Url) -> Result<(), SessionError>;

    /// Whether a window is open and not closed by the user.
    fn is_open(&self) -> bool;

    /// Post a message to the window.
    fn post(&mut self, message: &OutboundMessage) -> Result<(), SessionError>;
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Loading { message: String },
    LoadingHidden,
    Notice { message: String, kind: NoticeKind },
    Affordance { affordance: Affordance },
    Confirmation { summary: Box<ConfirmationSummary> },
}

/// Surface that records calls instead of rendering them.
///
/// Used by the CLI dry run and by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    events: Vec<SurfaceEvent>,
    loading: Option<String>,
    affordance: Option<Affordance>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SurfaceEvent] {
        &self.events
    }

    /// Message of the loading overlay currently shown.
    pub fn loading(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    /// Affordance last set, if any.
    pub fn affordance(&self) -> Option<Affordance> {
        self.affordance
    }

    pub fn notices(&self) -> Vec<(&str, NoticeKind)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Notice { message, kind } => Some((message.as_str(), *kind)),
                _ => None,
            })
            .collect()
    }

    /// The last confirmation rendered.
    pub fn confirmation(&self) -> Option<&ConfirmationSummary> {
        self.events.iter().rev().find_map(|e| match e {
            SurfaceEvent::Confirmation { summary } => Some(summary.as_ref()),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn show_loading(&mut self, message: &str) {
        self.loading = Some(message.to_string());
        self.events.push(SurfaceEvent::Loading {
            message: message.to_string(),
        });
    }

    fn hide_loading(&mut self) {
        self.loading = None;
        self.events.push(SurfaceEvent::LoadingHidden);
    }

    fn notify(&mut self, message: &str, kind: NoticeKind) {
        self.events.push(SurfaceEvent::Notice {
            message: message.to_string(),
            kind,
        });
    }

    fn set_affordance(&mut self, affordance: Affordance) {
        self.affordance = Some(affordance);
        self.events.push(SurfaceEvent::Affordance { affordance });
    }

    fn show_confirmation(&mut self, summary: &ConfirmationSummary) {
        self.events.push(SurfaceEvent::Confirmation {
            summary: Box::new(summary.clone()),
        });
    }
}

/// Session window that records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingWindow {
    /// URLs opened, in order.
    pub opened: Vec<Url>,
    /// Messages posted, in order.
    pub posted: Vec<OutboundMessage>,
    /// Whether the window counts as open.
    pub open: bool,
    /// When set, `open` fails with this reason (a blocked popup).
    pub block_reason: Option<String>,
}

impl RecordingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user closing the window.
    pub fn close(&mut self) {
        self.open = false;
    }
}

impl SessionWindow for RecordingWindow {
    fn open(&mut self, url: &Url) -> Result<(), SessionError> {
        if let Some(reason) = &self.block_reason {
            return Err(SessionError::OpenFailed(reason.clone()));
        }
        self.opened.push(url.clone());
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn post(&mut self, message: &OutboundMessage) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::WindowClosed);
        }
        self.posted.push(message.clone());
        Ok(())
    }
}
