//! WASM bindings for the paylens checkout engine.
//!
//! Runs as a content script: the live document is the page, injected
//! overlays are the surface and a popup is the session window.

mod agent;
mod dom;
mod surface;
mod window;

pub use agent::CheckoutAgent;
pub use dom::DomPage;
pub use surface::OverlaySurface;
pub use window::PopupWindow;

use serde::Serialize;
use tracing_subscriber::prelude::*;
use tracing_web::MakeWebConsoleWriter;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use paylens_core::{extract_total_amount_from_text, Currency};

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new());

    // A second init (another bundle on the page) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Select the authoritative total from page text.
///
/// Returns `{ amount, currencyCode, originalText }` or `null`.
#[wasm_bindgen(js_name = extractTotalAmountFromText)]
pub fn extract_total_amount_from_text_js(
    text: &str,
    default_currency: Option<String>,
) -> Result<JsValue, JsValue> {
    let default_currency = match default_currency.as_deref() {
        Some(code) => code.parse::<Currency>().map_err(|e| JsValue::from_str(&e))?,
        None => Currency::Usd,
    };

    match extract_total_amount_from_text(text, default_currency) {
        Some(total) => to_js(&total),
        None => Ok(JsValue::NULL),
    }
}

/// Serialize to a plain JS object.
pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Run `f` once after `ms` milliseconds.
pub(crate) fn schedule(ms: u32, f: impl FnOnce() + 'static) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(f);
    let timeout = i32::try_from(ms).unwrap_or(i32::MAX);
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.unchecked_ref(),
        timeout,
    ) {
        tracing::warn!("setTimeout failed: {}", dom::js_reason(&e));
    }
}
