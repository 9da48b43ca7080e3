//! Injected UI: the action button, loading overlay, notices and the
//! confirmation overlay.

use js_sys::Function;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use paylens_core::session::LOADING_CONFIRMING;
use paylens_core::{Affordance, ConfirmationSummary, NoticeKind, Surface};

use crate::dom::js_reason;
use crate::schedule;

const BUTTON_ID: &str = "paylens-action";
const LOADING_ID: &str = "paylens-loading";
const CONFIRMATION_ID: &str = "paylens-confirmation";

const NOTICE_MS: u32 = 3000;

const BUTTON_STYLE: &str = "position:fixed;bottom:24px;right:24px;z-index:2147483646;\
    padding:12px 20px;border:none;border-radius:8px;background:#4f46e5;color:#fff;\
    font:600 14px system-ui,sans-serif;cursor:pointer;box-shadow:0 4px 12px rgba(0,0,0,.2);";
const OVERLAY_STYLE: &str = "position:fixed;inset:0;z-index:2147483647;display:flex;\
    align-items:center;justify-content:center;background:rgba(0,0,0,.55);\
    font:15px system-ui,sans-serif;color:#111;";
const PANEL_STYLE: &str = "background:#fff;border-radius:12px;padding:24px 28px;min-width:280px;\
    max-width:420px;box-shadow:0 12px 32px rgba(0,0,0,.3);";
const NOTICE_STYLE: &str = "position:fixed;top:24px;right:24px;z-index:2147483647;\
    padding:12px 16px;border-radius:8px;color:#fff;font:14px system-ui,sans-serif;";

/// [`Surface`] rendered into the host document.
///
/// Rendering failures are logged and dropped.
pub struct OverlaySurface {
    document: Document,
    on_click: Function,
}

impl OverlaySurface {
    /// `on_click` is attached to the action button when it is created.
    pub fn new(document: Document, on_click: Function) -> Self {
        Self { document, on_click }
    }

    fn button(&self) -> Result<HtmlElement, JsValue> {
        if let Some(existing) = self.document.get_element_by_id(BUTTON_ID) {
            return existing.dyn_into::<HtmlElement>().map_err(Into::into);
        }

        let button = self.create("button")?;
        button.set_id(BUTTON_ID);
        button.set_attribute("type", "button")?;
        button.set_attribute("style", BUTTON_STYLE)?;
        button.add_event_listener_with_callback("click", &self.on_click)?;
        self.append_to_body(&button)?;
        Ok(button)
    }

    fn render_affordance(&self, affordance: Affordance) -> Result<(), JsValue> {
        let button = self.button()?;
        let style = button.style();
        let (label, disabled) = match affordance {
            Affordance::Hidden => {
                style.set_property("display", "none")?;
                return Ok(());
            }
            Affordance::Pay => ("Pay with crypto", false),
            Affordance::Confirm => ("Confirm transaction", false),
            Affordance::Confirming => (LOADING_CONFIRMING, true),
        };

        style.set_property("display", "block")?;
        style.set_property("opacity", if disabled { "0.6" } else { "1" })?;
        button.set_text_content(Some(label));
        if disabled {
            button.set_attribute("disabled", "")?;
        } else {
            button.remove_attribute("disabled")?;
        }
        Ok(())
    }

    fn render_loading(&self, message: &str) -> Result<(), JsValue> {
        self.remove(LOADING_ID);

        let overlay = self.create("div")?;
        overlay.set_id(LOADING_ID);
        overlay.set_attribute("style", OVERLAY_STYLE)?;

        let panel = self.create("div")?;
        panel.set_attribute("style", PANEL_STYLE)?;
        panel.set_text_content(Some(&format!("{}…", message)));

        overlay.append_child(&panel)?;
        self.append_to_body(&overlay)
    }

    fn render_notice(&self, message: &str, kind: NoticeKind) -> Result<(), JsValue> {
        let background = match kind {
            NoticeKind::Info => "#2563eb",
            NoticeKind::Success => "#16a34a",
            NoticeKind::Error => "#dc2626",
        };

        let notice = self.create("div")?;
        notice.set_attribute("style", &format!("{}background:{};", NOTICE_STYLE, background))?;
        notice.set_attribute("role", "status")?;
        notice.set_text_content(Some(message));
        self.append_to_body(&notice)?;

        let dismiss: Element = notice.into();
        schedule(NOTICE_MS, move || dismiss.remove());
        Ok(())
    }

    fn render_confirmation(&self, summary: &ConfirmationSummary) -> Result<(), JsValue> {
        self.remove(CONFIRMATION_ID);

        let overlay = self.create("div")?;
        overlay.set_id(CONFIRMATION_ID);
        overlay.set_attribute("style", OVERLAY_STYLE)?;

        let panel = self.create("div")?;
        panel.set_attribute("style", PANEL_STYLE)?;

        let heading = self.create("h2")?;
        heading.set_text_content(Some("Payment complete"));
        panel.append_child(&heading)?;

        self.row(&panel, "Amount", &summary.display_amount())?;
        if let Some(original) = &summary.original_amount {
            self.row(&panel, "Original amount", original)?;
        }
        self.row(&panel, "Merchant", &summary.merchant)?;
        self.row(&panel, "Domain", &summary.domain)?;
        if let Some(name) = summary.product.as_ref().and_then(|p| p.product_name.as_ref()) {
            self.row(&panel, "Booking", name)?;
        }
        self.row(&panel, "Paid", &summary.paid_at.format("%Y-%m-%d %H:%M UTC").to_string())?;
        self.row(&panel, "Method", &summary.payment_method)?;
        self.row(&panel, "Transaction", &summary.transaction_id)?;

        let close = self.create("button")?;
        close.set_attribute("type", "button")?;
        close.set_text_content(Some("Close"));
        let target: Element = overlay.clone().into();
        let on_close = Closure::once_into_js(move || target.remove());
        close.add_event_listener_with_callback("click", on_close.unchecked_ref())?;
        panel.append_child(&close)?;

        overlay.append_child(&panel)?;
        self.append_to_body(&overlay)
    }

    fn row(&self, panel: &HtmlElement, label: &str, value: &str) -> Result<(), JsValue> {
        let row = self.create("p")?;
        let strong = self.create("strong")?;
        strong.set_text_content(Some(&format!("{}: ", label)));
        row.append_child(&strong)?;
        row.append_with_str_1(value)?;
        panel.append_child(&row)?;
        Ok(())
    }

    fn create(&self, tag: &str) -> Result<HtmlElement, JsValue> {
        self.document
            .create_element(tag)?
            .dyn_into::<HtmlElement>()
            .map_err(Into::into)
    }

    fn append_to_body(&self, element: &HtmlElement) -> Result<(), JsValue> {
        let body = self
            .document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;
        body.append_child(element)?;
        Ok(())
    }

    fn remove(&self, id: &str) {
        if let Some(existing) = self.document.get_element_by_id(id) {
            existing.remove();
        }
    }
}

impl Surface for OverlaySurface {
    fn show_loading(&mut self, message: &str) {
        if let Err(e) = self.render_loading(message) {
            warn!("Could not show loading overlay: {}", js_reason(&e));
        }
    }

    fn hide_loading(&mut self) {
        self.remove(LOADING_ID);
    }

    fn notify(&mut self, message: &str, kind: NoticeKind) {
        if let Err(e) = self.render_notice(message, kind) {
            warn!("Could not show notice: {}", js_reason(&e));
        }
    }

    fn set_affordance(&mut self, affordance: Affordance) {
        if let Err(e) = self.render_affordance(affordance) {
            warn!("Could not render the action button: {}", js_reason(&e));
        }
    }

    fn show_confirmation(&mut self, summary: &ConfirmationSummary) {
        if let Err(e) = self.render_confirmation(summary) {
            warn!("Could not render the confirmation: {}", js_reason(&e));
        }
    }
}
