//! Typed selector-equivalent.
//!
//! Rule tables are written as [`Selector`] values so they can be evaluated
//! in-process against [`PageElement`] snapshots or rendered to a CSS selector
//! for `querySelectorAll` on a live document. Both paths share one meaning:
//! `contains` is a case-insensitive substring test (`[a*="v" i]`), `equals`
//! is exact (`[a="v"]`).

use std::fmt;

use super::PageElement;

/// One attribute condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Attribute contains the needle, ignoring ASCII case.
    Contains { attr: &'static str, needle: &'static str },
    /// Attribute equals the value exactly.
    Equals { attr: &'static str, value: &'static str },
    /// Attribute is absent or does not contain the needle, ignoring case.
    Lacks { attr: &'static str, needle: &'static str },
    /// Attribute is present.
    Present { attr: &'static str },
}

impl Condition {
    fn matches(&self, element: &PageElement) -> bool {
        match self {
            Self::Contains { attr, needle } => element
                .attr(attr)
                .is_some_and(|v| contains_ignore_case(v, needle)),
            Self::Equals { attr, value } => element.attr(attr) == Some(*value),
            Self::Lacks { attr, needle } => !element
                .attr(attr)
                .is_some_and(|v| contains_ignore_case(v, needle)),
            Self::Present { attr } => element.attr(attr).is_some(),
        }
    }

    fn write_css(&self, out: &mut String) {
        match self {
            Self::Contains { attr, needle } => {
                out.push_str(&format!("[{}*=\"{}\" i]", attr, escape(needle)));
            }
            Self::Equals { attr, value } => {
                out.push_str(&format!("[{}=\"{}\"]", attr, escape(value)));
            }
            Self::Lacks { attr, needle } => {
                out.push_str(&format!(":not([{}*=\"{}\" i])", attr, escape(needle)));
            }
            Self::Present { attr } => {
                out.push_str(&format!("[{}]", attr));
            }
        }
    }
}

/// A compound selector: optional tag plus attribute conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<&'static str>,
    conditions: Vec<Condition>,
}

impl Selector {
    /// Selector for a tag name.
    pub fn tag(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            conditions: Vec::new(),
        }
    }

    /// Selector for any element.
    pub fn any() -> Self {
        Self {
            tag: None,
            conditions: Vec::new(),
        }
    }

    pub fn contains(mut self, attr: &'static str, needle: &'static str) -> Self {
        self.conditions.push(Condition::Contains { attr, needle });
        self
    }

    pub fn equals(mut self, attr: &'static str, value: &'static str) -> Self {
        self.conditions.push(Condition::Equals { attr, value });
        self
    }

    pub fn lacks(mut self, attr: &'static str, needle: &'static str) -> Self {
        self.conditions.push(Condition::Lacks { attr, needle });
        self
    }

    pub fn present(mut self, attr: &'static str) -> Self {
        self.conditions.push(Condition::Present { attr });
        self
    }

    /// Evaluate against an element snapshot.
    pub fn matches(&self, element: &PageElement) -> bool {
        if let Some(tag) = self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.conditions.iter().all(|c| c.matches(element))
    }

    /// Render as a CSS compound selector.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        if let Some(tag) = self.tag {
            out.push_str(tag);
        }
        for condition in &self.conditions {
            condition.write_css(&mut out);
        }
        if out.is_empty() {
            out.push('*');
        }
        out
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// A selector group; matches when any member matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorList(Vec<Selector>);

impl SelectorList {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }

    /// A list with one member.
    pub fn single(selector: Selector) -> Self {
        Self(vec![selector])
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.0
    }

    pub fn matches(&self, element: &PageElement) -> bool {
        self.0.iter().any(|s| s.matches(element))
    }

    /// Render as a CSS selector list.
    pub fn to_css(&self) -> String {
        self.0
            .iter()
            .map(Selector::to_css)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<Selector> for SelectorList {
    fn from(selector: Selector) -> Self {
        Self::single(selector)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Case-insensitive substring test.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ElementHandle;

    fn input(attrs: &[(&str, &str)]) -> PageElement {
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
    fn test_contains_ignores_case() {
        let selector = Selector::tag("input").contains("name", "cardnumber");
        assert!(selector.matches(&input(&[("name", "billing[CardNumber]")])));
        assert!(!selector.matches(&input(&[("name", "card")])));
        assert!(!selector.matches(&input(&[])));
    }

    #[test]
    fn test_equals_is_exact() {
        let selector = Selector::tag("input").equals("placeholder", "MM");
        assert!(selector.matches(&input(&[("placeholder", "MM")])));
        assert!(!selector.matches(&input(&[("placeholder", "mm")])));
    }

    #[test]
    fn test_lacks_accepts_missing_attribute() {
        let selector = Selector::tag("input")
            .contains("name", "exp")
            .lacks("name", "cvv");
        assert!(selector.matches(&input(&[("name", "exp-date")])));
        assert!(!selector.matches(&input(&[("name", "exp_cvv")])));
        assert!(Selector::any().lacks("class", "logo").matches(&input(&[])));
    }

    #[test]
    fn test_tag_mismatch() {
        let mut select = input(&[("name", "month")]);
        select.tag = "select".to_string();
        assert!(!Selector::tag("input").contains("name", "month").matches(&select));
        assert!(Selector::tag("select").contains("name", "month").matches(&select));
    }

    #[test]
    fn test_to_css() {
        let list = SelectorList::new(vec![
            Selector::tag("input")
                .contains("name", "exp")
                .lacks("name", "cvv"),
            Selector::tag("input").equals("autocomplete", "cc-exp"),
            Selector::any().contains("class", "total"),
            Selector::tag("img").present("src"),
            Selector::any(),
        ]);
        assert_eq!(
            list.to_css(),
            "input[name*=\"exp\" i]:not([name*=\"cvv\" i]), \
             input[autocomplete=\"cc-exp\"], \
             [class*=\"total\" i], img[src], *"
        );
    }

    #[test]
    fn test_list_matches_any_member() {
        let list = SelectorList::new(vec![
            Selector::tag("input").contains("name", "cvv"),
            Selector::tag("input").contains("id", "cvc"),
        ]);
        assert!(list.matches(&input(&[("id", "card-cvc")])));
        assert!(!list.matches(&input(&[("id", "zip")])));
    }
}
