//! `CheckoutAgent`: wires the orchestrator to browser events.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, MessageEvent, Window};

use paylens_core::{
    is_checkout_page, CheckoutAnalyzer, ConfirmOutcome, HttpRateSource, MessageOutcome,
    Orchestrator, PaylensConfig, SessionError, SessionState,
};

use crate::dom::DomPage;
use crate::surface::OverlaySurface;
use crate::window::PopupWindow;
use crate::{schedule, to_js};

/// Interval of the session timeout check.
const TICK_MS: i32 = 1000;

struct AgentState {
    orchestrator: Orchestrator<HttpRateSource>,
    surface: OverlaySurface,
    window: PopupWindow,
}

type Shared = Rc<RefCell<AgentState>>;

/// Content-script entry point for one page.
///
/// Event handlers skip their work while another handler holds the state.
/// Every hold is synchronous; the pay action releases the state for its
/// rate lookup.
#[wasm_bindgen]
pub struct CheckoutAgent {
    window: Window,
    config: PaylensConfig,
    state: Shared,
    on_message: Option<Closure<dyn FnMut(Event)>>,
    on_pagehide: Option<Closure<dyn FnMut(Event)>>,
    on_tick: Option<Closure<dyn FnMut()>>,
    ticker: Option<i32>,
    // Kept alive for the action button's listener.
    _on_click: Closure<dyn FnMut(Event)>,
}

#[wasm_bindgen]
impl CheckoutAgent {
    /// Create an agent. `config_json` overrides defaults key by key.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<CheckoutAgent, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) => {
                PaylensConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?
            }
            None => PaylensConfig::default(),
        };

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let source =
            HttpRateSource::new(&config.rates).map_err(|e| JsValue::from_str(&e.to_string()))?;

        // The click handler needs the shared state, which needs the surface,
        // which needs the click handler: tie the knot through a slot.
        let slot: Rc<RefCell<Option<Shared>>> = Rc::new(RefCell::new(None));
        let click_slot = slot.clone();
        let on_click = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Some(state) = click_slot.borrow().as_ref() {
                spawn_local(handle_click(state.clone()));
            }
        });

        let state = Rc::new(RefCell::new(AgentState {
            orchestrator: Orchestrator::new(config.clone(), source),
            surface: OverlaySurface::new(
                document,
                on_click.as_ref().unchecked_ref::<js_sys::Function>().clone(),
            ),
            window: PopupWindow::new(
                window.clone(),
                config.session.window_name.clone(),
                config.session.window_features.clone(),
            ),
        }));
        *slot.borrow_mut() = Some(state.clone());

        Ok(CheckoutAgent {
            window,
            config,
            state,
            on_message: None,
            on_pagehide: None,
            on_tick: None,
            ticker: None,
            _on_click: on_click,
        })
    }

    /// Classify now and again after the configured delay, then listen for
    /// session messages, navigation and timeouts.
    pub fn start(&mut self) -> Result<bool, JsValue> {
        if self.on_message.is_some() {
            return self.is_checkout_page();
        }

        let is_checkout = classify(&self.state);

        let delay = self.state.borrow().orchestrator.reclassify_delay();
        let later = self.state.clone();
        schedule(millis(delay), move || {
            classify(&later);
        });

        let state = self.state.clone();
        let on_message = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            if let Some(event) = event.dyn_ref::<MessageEvent>() {
                handle_message(&state, event);
            }
        });
        self.window
            .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;

        let state = self.state.clone();
        let on_pagehide = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Ok(mut guard) = state.try_borrow_mut() {
                let AgentState { orchestrator, surface, .. } = &mut *guard;
                orchestrator.navigate(surface);
            }
        });
        self.window
            .add_event_listener_with_callback("pagehide", on_pagehide.as_ref().unchecked_ref())?;

        let state = self.state.clone();
        let on_tick = Closure::<dyn FnMut()>::new(move || {
            if let Ok(mut guard) = state.try_borrow_mut() {
                let AgentState { orchestrator, surface, .. } = &mut *guard;
                orchestrator.tick(surface, Utc::now());
            }
        });
        let ticker = self.window.set_interval_with_callback_and_timeout_and_arguments_0(
            on_tick.as_ref().unchecked_ref(),
            TICK_MS,
        )?;

        self.on_message = Some(on_message);
        self.on_pagehide = Some(on_pagehide);
        self.on_tick = Some(on_tick);
        self.ticker = Some(ticker);

        info!("Agent started on {}", self.window.location().href().unwrap_or_default());
        Ok(is_checkout)
    }

    /// Remove listeners and stop the timeout check.
    pub fn stop(&mut self) {
        if let Some(closure) = self.on_message.take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref());
        }
        if let Some(closure) = self.on_pagehide.take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
        }
        if let Some(ticker) = self.ticker.take() {
            self.window.clear_interval_with_handle(ticker);
        }
        self.on_tick = None;
    }

    /// Whether the current document looks like a checkout page.
    #[wasm_bindgen(js_name = isCheckoutPage)]
    pub fn is_checkout_page(&self) -> Result<bool, JsValue> {
        let page = DomPage::current().map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(is_checkout_page(&page, &self.config.classifier))
    }

    /// Full analysis of the current document.
    pub fn analyze(&self) -> Result<JsValue, JsValue> {
        let page = DomPage::current().map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&CheckoutAnalyzer::new(&self.config).analyze(&page))
    }

    /// Current session state, e.g. `awaiting_session`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.current_state()
    }
}

impl CheckoutAgent {
    fn current_state(&self) -> String {
        self.state
            .try_borrow()
            .map(|s| s.orchestrator.state().as_str().to_string())
            .unwrap_or_else(|_| SessionState::Extracting.as_str().to_string())
    }
}

impl Drop for CheckoutAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

fn millis(delay: Duration) -> u32 {
    u32::try_from(delay.as_millis()).unwrap_or(u32::MAX)
}

fn classify(state: &Shared) -> bool {
    let Ok(mut guard) = state.try_borrow_mut() else {
        return false;
    };
    let page = match DomPage::current() {
        Ok(page) => page,
        Err(e) => {
            warn!("No document to classify: {}", e);
            return false;
        }
    };
    let AgentState { orchestrator, surface, .. } = &mut *guard;
    orchestrator.classify(&page, surface)
}

async fn handle_click(state: Shared) {
    let (pending, converter) = {
        let Ok(mut guard) = state.try_borrow_mut() else {
            debug!("Click while busy, ignored");
            return;
        };
        let AgentState { orchestrator, surface, window } = &mut *guard;

        match orchestrator.state() {
            SessionState::Classified => {
                let page = match DomPage::current() {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("No document to pay from: {}", e);
                        return;
                    }
                };
                match orchestrator.begin_payment(&page, surface, Utc::now()) {
                    Ok(pending) => (pending, orchestrator.converter().clone()),
                    Err(e) => {
                        warn!("Pay failed: {}", e);
                        return;
                    }
                }
            }
            SessionState::Filled => {
                match orchestrator.confirm(window, surface, Utc::now()) {
                    Ok(ConfirmOutcome::Sent) => {}
                    Ok(ConfirmOutcome::Reopened { retry_after }) => {
                        let later = state.clone();
                        schedule(millis(retry_after), move || resend(&later));
                    }
                    Err(e) => warn!("Confirm failed: {}", e),
                }
                return;
            }
            other => {
                debug!("Click ignored while {}", other);
                return;
            }
        }
    };

    // No borrow across the lookup: navigation and messages still land.
    let usd_amount = pending.normalize(&converter).await;

    let Ok(mut guard) = state.try_borrow_mut() else {
        warn!("State busy after the rate lookup, pay attempt dropped");
        return;
    };
    let AgentState { orchestrator, surface, window } = &mut *guard;
    match orchestrator.finish_payment(pending, usd_amount, surface, window, Utc::now()) {
        Ok(context) => info!("Session opened for {}", context.merchant.domain),
        Err(SessionError::Superseded { state: now }) => debug!("Pay attempt dropped, now {}", now),
        Err(e) => warn!("Pay failed: {}", e),
    }
}

fn handle_message(state: &Shared, event: &MessageEvent) {
    let data: serde_json::Value = match serde_wasm_bindgen::from_value(event.data()) {
        Ok(data) => data,
        Err(_) => return,
    };

    let Ok(mut guard) = state.try_borrow_mut() else {
        warn!("Message from {} arrived while busy, dropped", event.origin());
        return;
    };
    let AgentState { orchestrator, surface, .. } = &mut *guard;

    match orchestrator.handle_message(surface, &event.origin(), data, Utc::now()) {
        MessageOutcome::FillScheduled { delay } => {
            let later = state.clone();
            schedule(millis(delay), move || fill(&later));
        }
        MessageOutcome::Confirmed { summary } => {
            info!("Confirmed {}", summary.transaction_id);
        }
        MessageOutcome::Ignored { reason } => debug!("Message ignored: {}", reason),
    }
}

fn fill(state: &Shared) {
    let Ok(mut guard) = state.try_borrow_mut() else {
        warn!("Fill skipped, state busy");
        return;
    };
    let mut page = match DomPage::current() {
        Ok(page) => page,
        Err(e) => {
            warn!("No document to fill: {}", e);
            return;
        }
    };
    let AgentState { orchestrator, surface, .. } = &mut *guard;
    match orchestrator.fill(&mut page, surface, Utc::now()) {
        Ok(report) => info!(
            "Filled {} fields, {} missing",
            report.filled.len(),
            report.missing.len()
        ),
        Err(e) => warn!("Fill failed: {}", e),
    }
}

fn resend(state: &Shared) {
    let Ok(mut guard) = state.try_borrow_mut() else {
        return;
    };
    let AgentState { orchestrator, window, .. } = &mut *guard;
    if let Err(e) = orchestrator.resend_confirmation(window) {
        warn!("Deferred confirmation failed: {}", e);
    }
}
