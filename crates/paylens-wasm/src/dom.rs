//! [`Page`] and [`FormHost`] over the live document.

use std::cell::RefCell;
use std::collections::BTreeMap;

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Window};

use paylens_core::page::Result;
use paylens_core::{ElementHandle, FieldEvent, FormHost, Page, PageElement, PageError, SelectorList};

/// The current document.
///
/// Handles index into a registry of elements returned by earlier queries;
/// they are valid only for the `DomPage` that issued them. Create a fresh
/// page per operation so the registry stays small.
pub struct DomPage {
    window: Window,
    document: Document,
    registry: RefCell<Vec<Element>>,
}

impl DomPage {
    pub fn new(window: Window, document: Document) -> Self {
        Self {
            window,
            document,
            registry: RefCell::new(Vec::new()),
        }
    }

    /// The page of the global window.
    pub fn current() -> Result<Self> {
        let window = web_sys::window().ok_or(PageError::NotReady)?;
        let document = window.document().ok_or(PageError::NotReady)?;
        Ok(Self::new(window, document))
    }

    fn register(&self, element: Element) -> ElementHandle {
        let mut registry = self.registry.borrow_mut();
        registry.push(element);
        ElementHandle(registry.len() - 1)
    }

    fn element(&self, handle: ElementHandle) -> Result<Element> {
        self.registry
            .borrow()
            .get(handle.0)
            .cloned()
            .ok_or(PageError::UnknownElement(handle.0))
    }

    fn snapshot(&self, element: Element) -> PageElement {
        let mut attributes = BTreeMap::new();
        let attrs = element.attributes();
        for i in 0..attrs.length() {
            if let Some(attr) = attrs.item(i) {
                attributes.insert(attr.name().to_ascii_lowercase(), attr.value());
            }
        }

        let rect = element.get_bounding_client_rect();
        let tag = element.tag_name().to_ascii_lowercase();
        let text = element.text_content().unwrap_or_default();

        PageElement {
            handle: self.register(element),
            tag,
            attributes,
            text,
            width: rect.width().max(0.0) as u32,
            height: rect.height().max(0.0) as u32,
        }
    }
}

impl Page for DomPage {
    fn url(&self) -> String {
        self.document
            .location()
            .and_then(|l| l.href().ok())
            .unwrap_or_default()
    }

    fn title(&self) -> Result<String> {
        Ok(self.document.title())
    }

    fn body_text(&self) -> Result<Option<String>> {
        Ok(self.document.body().map(|body| body.inner_text()))
    }

    fn query(&self, selectors: &SelectorList) -> Result<Vec<PageElement>> {
        let css = selectors.to_css();
        let nodes = self
            .document
            .query_selector_all(&css)
            .map_err(|e| PageError::Selector {
                selector: css.clone(),
                reason: js_reason(&e),
            })?;

        let mut elements = Vec::with_capacity(nodes.length() as usize);
        for i in 0..nodes.length() {
            if let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                elements.push(self.snapshot(element));
            }
        }
        Ok(elements)
    }

    fn background_image(&self, element: &PageElement) -> Result<Option<String>> {
        let element = self.element(element.handle)?;
        let style = self
            .window
            .get_computed_style(&element)
            .map_err(|e| PageError::Interaction(js_reason(&e)))?;

        Ok(style
            .and_then(|s| s.get_property_value("background-image").ok())
            .filter(|v| !v.is_empty() && v != "none"))
    }
}

impl DomPage {
    /// Assign through the `value` setter on `class`'s prototype.
    ///
    /// `el.value = v` goes through any `value` property a form framework
    /// defined on the instance, and that framework then drops the change.
    fn set_native_value(&self, element: &Element, class: &str, value: &str) -> Result<()> {
        let interaction = |e: JsValue| PageError::Interaction(js_reason(&e));

        let constructor = Reflect::get(&self.window, &JsValue::from_str(class)).map_err(interaction)?;
        let prototype: Object = Reflect::get(&constructor, &JsValue::from_str("prototype"))
            .map_err(interaction)?
            .dyn_into()
            .map_err(|_| PageError::Interaction(format!("{} has no prototype", class)))?;

        let descriptor = Object::get_own_property_descriptor(&prototype, &JsValue::from_str("value"));
        let setter: Function = Reflect::get(&descriptor, &JsValue::from_str("set"))
            .map_err(interaction)?
            .dyn_into()
            .map_err(|_| PageError::Interaction(format!("{}.value has no setter", class)))?;

        setter
            .call1(element, &JsValue::from_str(value))
            .map(|_| ())
            .map_err(interaction)
    }
}

impl FormHost for DomPage {
    fn set_value(&mut self, element: ElementHandle, value: &str) -> Result<()> {
        let element = self.element(element)?;

        let class = if element.is_instance_of::<HtmlInputElement>() {
            "HTMLInputElement"
        } else if element.is_instance_of::<HtmlSelectElement>() {
            "HTMLSelectElement"
        } else if element.is_instance_of::<HtmlTextAreaElement>() {
            "HTMLTextAreaElement"
        } else {
            return Err(PageError::Interaction(format!(
                "<{}> is not a form field",
                element.tag_name().to_ascii_lowercase()
            )));
        };
        self.set_native_value(&element, class, value)?;

        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            // Focus is cosmetic; some forms validate only focused fields.
            let _ = html.focus();
        }
        Ok(())
    }

    fn dispatch(&mut self, element: ElementHandle, event: FieldEvent) -> Result<()> {
        let element = self.element(element)?;

        let init = EventInit::new();
        init.set_bubbles(true);
        let event = Event::new_with_event_init_dict(event.as_str(), &init)
            .map_err(|e| PageError::Interaction(js_reason(&e)))?;

        element
            .dispatch_event(&event)
            .map(|_| ())
            .map_err(|e| PageError::Interaction(js_reason(&e)))
    }
}

/// Readable text for a thrown JS value.
pub(crate) fn js_reason(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
