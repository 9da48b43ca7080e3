//! Host page model.
//!
//! Extractors never touch a DOM directly: they read through [`Page`], and the
//! fill engine writes through [`FormHost`]. The browser binding implements
//! both over the live document; [`HtmlPage`] implements them over a static
//! HTML snapshot for the CLI and for tests.

mod html;
mod selector;

pub use html::HtmlPage;
pub use selector::{Condition, Selector, SelectorList};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PageError;

/// Result type for page operations.
pub type Result<T> = std::result::Result<T, PageError>;

/// Opaque element reference, valid only for the page that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub usize);

/// Snapshot of an element at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageElement {
    pub handle: ElementHandle,

    /// Lowercase tag name.
    pub tag: String,

    /// Attributes keyed by lowercase name.
    pub attributes: BTreeMap<String, String>,

    /// Text content.
    pub text: String,

    /// Rendered (or declared) width in pixels, 0 when unknown.
    pub width: u32,

    /// Rendered (or declared) height in pixels, 0 when unknown.
    pub height: u32,
}

impl PageElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value or the empty string.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    pub fn class_name(&self) -> &str {
        self.attr_or_empty("class")
    }

    pub fn id(&self) -> &str {
        self.attr_or_empty("id")
    }

    /// Trimmed text content.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Short label for logs: `tag#id` or `tag[name=…]`.
    pub fn describe(&self) -> String {
        if let Some(id) = self.attr("id").filter(|v| !v.is_empty()) {
            format!("{}#{}", self.tag, id)
        } else if let Some(name) = self.attr("name").filter(|v| !v.is_empty()) {
            format!("{}[name={}]", self.tag, name)
        } else {
            self.tag.clone()
        }
    }
}

/// Read-only view of the current document.
pub trait Page {
    /// Current page URL.
    fn url(&self) -> String;

    /// Document title.
    fn title(&self) -> Result<String>;

    /// Rendered body text, `None` while the body does not exist yet.
    fn body_text(&self) -> Result<Option<String>>;

    /// Elements matching any selector of the list, in document order.
    fn query(&self, selectors: &SelectorList) -> Result<Vec<PageElement>>;

    /// Computed `background-image` of an element, e.g. `url("a.jpg")`.
    fn background_image(&self, element: &PageElement) -> Result<Option<String>>;

    /// First element matching the list, in document order.
    fn query_first(&self, selectors: &SelectorList) -> Result<Option<PageElement>> {
        Ok(self.query(selectors)?.into_iter().next())
    }

    /// Resolve a possibly relative URL against the page URL.
    fn resolve_url(&self, raw: &str) -> String {
        match Url::parse(&self.url()).and_then(|base| base.join(raw)) {
            Ok(url) => url.to_string(),
            Err(_) => raw.to_string(),
        }
    }
}

/// Notification dispatched after a synthetic value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEvent {
    Input,
    Change,
    Blur,
}

impl FieldEvent {
    /// Events raised after every write, in dispatch order.
    pub const SEQUENCE: [FieldEvent; 3] = [FieldEvent::Input, FieldEvent::Change, FieldEvent::Blur];

    /// DOM event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Blur => "blur",
        }
    }
}

/// A page whose form fields can be written.
pub trait FormHost: Page {
    /// Set the value through the element's native setter so framework
    /// wrappers around `value` are bypassed.
    fn set_value(&mut self, element: ElementHandle, value: &str) -> Result<()>;

    /// Dispatch a bubbling event on the element.
    fn dispatch(&mut self, element: ElementHandle, event: FieldEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(attrs: &[(&str, &str)]) -> PageElement {
        PageElement {
            handle: ElementHandle(0),
            tag: "input".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: String::new(),
            width: 0,
            height: 0,
        }
    }

    #[test]
    fn test_describe_prefers_id() {
        assert_eq!(element(&[("id", "cc"), ("name", "number")]).describe(), "input#cc");
        assert_eq!(element(&[("name", "number")]).describe(), "input[name=number]");
        assert_eq!(element(&[]).describe(), "input");
    }

    #[test]
    fn test_resolve_url() {
        let page = HtmlPage::parse("https://hotel.example/book/checkout", "<p>hi</p>");
        assert_eq!(page.resolve_url("/img/room.jpg"), "https://hotel.example/img/room.jpg");
        assert_eq!(
            page.resolve_url("https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
    }
}
