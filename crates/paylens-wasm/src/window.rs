//! The session window as a browser popup.

use serde::Serialize;
use tracing::debug;
use url::Url;
use web_sys::Window;

use paylens_core::{OutboundMessage, SessionError, SessionWindow};

use crate::dom::js_reason;

/// [`SessionWindow`] backed by `window.open` and `postMessage`.
pub struct PopupWindow {
    host: Window,
    name: String,
    features: String,
    popup: Option<Window>,
    target_origin: String,
}

impl PopupWindow {
    pub fn new(host: Window, name: impl Into<String>, features: impl Into<String>) -> Self {
        Self {
            host,
            name: name.into(),
            features: features.into(),
            popup: None,
            target_origin: "*".to_string(),
        }
    }
}

impl SessionWindow for PopupWindow {
    fn open(&mut self, url: &Url) -> Result<(), SessionError> {
        let popup = self
            .host
            .open_with_url_and_target_and_features(url.as_str(), &self.name, &self.features)
            .map_err(|e| SessionError::OpenFailed(js_reason(&e)))?
            .ok_or_else(|| SessionError::OpenFailed("popup blocked".to_string()))?;

        debug!("Session window opened at {}", url.origin().ascii_serialization());
        self.target_origin = url.origin().ascii_serialization();
        self.popup = Some(popup);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.popup
            .as_ref()
            .is_some_and(|w| !w.closed().unwrap_or(true))
    }

    fn post(&mut self, message: &OutboundMessage) -> Result<(), SessionError> {
        let popup = match &self.popup {
            Some(popup) if self.is_open() => popup,
            _ => return Err(SessionError::WindowClosed),
        };

        let value = message
            .to_value()
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| SessionError::PostFailed(e.to_string()))?;

        popup
            .post_message(&value, &self.target_origin)
            .map_err(|e| SessionError::PostFailed(js_reason(&e)))
    }
}
