//! Static HTML page backed by `scraper`.
//!
//! The document is parsed once and flattened into element snapshots in
//! document order; the snapshot index is the element handle. Writes made
//! through [`FormHost`] land in an overlay so the fill engine can be run
//! (and inspected) against a saved page.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::debug;

use super::{ElementHandle, FieldEvent, FormHost, Page, PageElement, Result, SelectorList};
use crate::error::PageError;

/// Elements whose content never reaches rendered text.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

/// Elements whose whitespace is preserved.
const PREFORMATTED_TAGS: &[&str] = &["pre", "textarea"];

/// Form controls that accept a value.
const FORM_TAGS: &[&str] = &["input", "select", "textarea"];

/// A parsed HTML document with a form-value overlay.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    title: String,
    body_text: Option<String>,
    elements: Vec<PageElement>,
    values: HashMap<ElementHandle, String>,
    events: Vec<(ElementHandle, FieldEvent)>,
}

impl HtmlPage {
    /// Parse a document served from `url`.
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        let document = Html::parse_document(html);

        let elements: Vec<PageElement> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
            .map(|(index, element)| snapshot(ElementHandle(index), element))
            .collect();

        let title = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "title")
            .map(|e| collapse_whitespace(&e.text().collect::<String>()))
            .unwrap_or_default();

        let body_text = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "body")
            .map(render_text);

        debug!("Parsed page with {} elements", elements.len());

        Self {
            url: url.into(),
            title,
            body_text,
            elements,
            values: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Read and parse a saved page.
    pub fn from_file(path: &Path, url: impl Into<String>) -> crate::Result<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::parse(url, &html))
    }

    /// All element snapshots in document order.
    pub fn elements(&self) -> &[PageElement] {
        &self.elements
    }

    /// Snapshot for a handle.
    pub fn element(&self, handle: ElementHandle) -> Option<&PageElement> {
        self.elements.get(handle.0)
    }

    /// Current value of a field: the last written value, else its `value`
    /// attribute.
    pub fn value(&self, handle: ElementHandle) -> Option<&str> {
        self.values
            .get(&handle)
            .map(String::as_str)
            .or_else(|| self.element(handle).and_then(|e| e.attr("value")))
    }

    /// Events dispatched so far, in order.
    pub fn events(&self) -> &[(ElementHandle, FieldEvent)] {
        &self.events
    }

    fn form_field(&self, handle: ElementHandle) -> Result<&PageElement> {
        let element = self
            .element(handle)
            .ok_or(PageError::UnknownElement(handle.0))?;
        if FORM_TAGS.contains(&element.tag.as_str()) {
            Ok(element)
        } else {
            Err(PageError::Interaction(format!(
                "{} is not a form field",
                element.describe()
            )))
        }
    }
}

impl Page for HtmlPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    fn body_text(&self) -> Result<Option<String>> {
        Ok(self.body_text.clone())
    }

    fn query(&self, selectors: &SelectorList) -> Result<Vec<PageElement>> {
        Ok(self
            .elements
            .iter()
            .filter(|e| selectors.matches(e))
            .cloned()
            .collect())
    }

    fn background_image(&self, element: &PageElement) -> Result<Option<String>> {
        let style = match element.attr("style") {
            Some(style) => style,
            None => return Ok(None),
        };

        let image = style.split(';').find_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if (property == "background-image" || property == "background")
                && value.to_ascii_lowercase().contains("url(")
            {
                Some(value.to_string())
            } else {
                None
            }
        });

        Ok(image)
    }
}

impl FormHost for HtmlPage {
    fn set_value(&mut self, element: ElementHandle, value: &str) -> Result<()> {
        self.form_field(element)?;
        self.values.insert(element, value.to_string());
        Ok(())
    }

    fn dispatch(&mut self, element: ElementHandle, event: FieldEvent) -> Result<()> {
        self.form_field(element)?;
        self.events.push((element, event));
        Ok(())
    }
}

fn snapshot(handle: ElementHandle, element: ElementRef<'_>) -> PageElement {
    let attributes: BTreeMap<String, String> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect();

    let width = dimension(&attributes, "width");
    let height = dimension(&attributes, "height");

    PageElement {
        handle,
        tag: element.value().name().to_ascii_lowercase(),
        text: element.text().collect(),
        attributes,
        width,
        height,
    }
}

/// Declared size from the attribute, else from an inline `px` style.
fn dimension(attributes: &BTreeMap<String, String>, name: &str) -> u32 {
    if let Some(value) = attributes.get(name).and_then(|v| parse_px(v)) {
        return value;
    }

    attributes
        .get("style")
        .and_then(|style| {
            style.split(';').find_map(|declaration| {
                let (property, value) = declaration.split_once(':')?;
                if property.trim().eq_ignore_ascii_case(name) {
                    parse_px(value)
                } else {
                    None
                }
            })
        })
        .unwrap_or(0)
}

fn parse_px(value: &str) -> Option<u32> {
    let value = value.trim();
    let value = value.strip_suffix("px").unwrap_or(value).trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
}

/// Approximate `innerText`: hidden subtrees skipped, block elements on their
/// own lines, whitespace collapsed outside preformatted elements.
fn render_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    walk(root, false, &mut raw);

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, preformatted: bool, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    let preformatted = preformatted || PREFORMATTED_TAGS.contains(&name);

    if block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                if preformatted {
                    out.push_str(text);
                } else {
                    push_collapsed(text, out);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, preformatted, out);
                }
            }
            _ => {}
        }
    }

    if block {
        out.push('\n');
    }
}

fn push_collapsed(text: &str, out: &mut String) {
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.ends_with([' ', '\n']) {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    if pending_space && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Selector;
    use pretty_assertions::assert_eq;

    const CHECKOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>  Grand Hotel | Secure Checkout </title>
  <style>.total { color: red }</style>
</head>
<body>
  <div class="summary">
    <p>Subtotal: <span>$40.00</span></p>
    <p>Tax: $4.50</p>
    <div id="order-total">Total: $44.50</div>
  </div>
  <script>var total = "Total: $9999";</script>
  <form>
    <input name="cardnumber" value="prefilled">
    <label>Expiry <input name="exp-month"></label>
  </form>
  <div class="hero" style="background-image: url('/img/room.jpg'); height: 300px"></div>
  <img src="/img/lobby.png" width="640" height="480" alt="Hotel lobby">
  <pre>Line   one
Line two</pre>
</body>
</html>"#;

    fn page() -> HtmlPage {
        HtmlPage::parse("https://hotel.example/checkout", CHECKOUT)
    }

    #[test]
    fn test_body_text_puts_blocks_on_separate_lines() {
        let text = page().body_text().unwrap().unwrap();
        assert!(text.contains("Subtotal: $40.00\nTax: $4.50\nTotal: $44.50"), "{text}");
        assert!(!text.contains("9999"));
        assert!(!text.contains("color: red"));
        assert!(text.contains("Line   one\nLine two"));
    }

    #[test]
    fn test_title_is_collapsed() {
        assert_eq!(page().title().unwrap(), "Grand Hotel | Secure Checkout");
    }

    #[test]
    fn test_query_in_document_order() {
        let page = page();
        let selectors = SelectorList::new(vec![
            Selector::any().contains("id", "total"),
            Selector::any().contains("class", "summary"),
        ]);
        let found = page.query(&selectors).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].class_name(), "summary");
        assert_eq!(found[1].id(), "order-total");
        assert_eq!(found[1].trimmed_text(), "Total: $44.50");
    }

    #[test]
    fn test_image_dimensions_and_background() {
        let page = page();
        let img = page
            .query_first(&Selector::tag("img").present("src").into())
            .unwrap()
            .unwrap();
        assert_eq!((img.width, img.height), (640, 480));

        let hero = page
            .query_first(&Selector::any().contains("class", "hero").into())
            .unwrap()
            .unwrap();
        assert_eq!(hero.height, 300);
        assert_eq!(
            page.background_image(&hero).unwrap().as_deref(),
            Some("url('/img/room.jpg')")
        );
        assert_eq!(page.background_image(&img).unwrap(), None);
    }

    #[test]
    fn test_form_overlay_records_values_and_events() {
        let mut page = page();
        let field = page
            .query_first(&Selector::tag("input").contains("name", "cardnumber").into())
            .unwrap()
            .unwrap();
        assert_eq!(page.value(field.handle), Some("prefilled"));

        page.set_value(field.handle, "4111").unwrap();
        page.dispatch(field.handle, FieldEvent::Input).unwrap();
        assert_eq!(page.value(field.handle), Some("4111"));
        assert_eq!(page.events(), &[(field.handle, FieldEvent::Input)]);
    }

    #[test]
    fn test_writes_rejected_outside_form_fields() {
        let mut page = page();
        let div = page
            .query_first(&Selector::tag("div").into())
            .unwrap()
            .unwrap();
        assert!(matches!(
            page.set_value(div.handle, "x"),
            Err(PageError::Interaction(_))
        ));
        assert_eq!(
            page.set_value(ElementHandle(10_000), "x"),
            Err(PageError::UnknownElement(10_000))
        );
    }
}
