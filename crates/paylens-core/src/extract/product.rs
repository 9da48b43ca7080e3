//! Product and booking metadata extraction.
//!
//! Tuned for hotel and travel checkouts: property name, hero image, address,
//! guest rating, stay dates. Each field is found independently and may be
//! absent.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::patterns::{
    ADDRESS_POSTAL, ADDRESS_REGION, ADDRESS_UAE, BREAKFAST, CANCELLATION, CHECK_IN_LONG,
    CHECK_IN_NUMERIC, CHECK_OUT_LONG, CHECK_OUT_NUMERIC, CSS_URL, DURATION, GUESTS, RATING,
};
use crate::models::ProductDetails;
use crate::page::{Page, PageElement, Selector, SelectorList};

/// Headings containing these words describe the checkout, not the product.
const HEADING_STOP_WORDS: &[&str] = &[
    "payment", "checkout", "refundable", "rate", "pricing", "total", "confirm", "review",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
const BACKGROUND_REJECT: &[&str] = &["logo", "icon", "sprite"];
const IMAGE_REJECT: &[&str] = &["logo", "icon", "avatar", "sprite"];
const IMAGE_HINTS: &[&str] = &["hotel", "room", "property"];

lazy_static! {
    static ref PROPERTY_NAMES: SelectorList = SelectorList::new(vec![
        Selector::any().contains("class", "hotel-name"),
        Selector::any().contains("class", "property-name"),
        Selector::any().contains("class", "propertyname"),
    ]);

    static ref HEADINGS: SelectorList = SelectorList::new(vec![
        Selector::tag("h1"),
        Selector::tag("h2"),
        Selector::tag("h3"),
        Selector::any().contains("class", "title"),
        Selector::any().contains("class", "name"),
        Selector::any().contains("class", "hotel"),
    ]);

    static ref OG_TITLE: SelectorList =
        Selector::tag("meta").equals("property", "og:title").into();

    static ref BACKGROUND_CANDIDATES: SelectorList = SelectorList::new(vec![
        Selector::any().contains("style", "background-image"),
        Selector::any().contains("class", "carousel"),
        Selector::any().contains("class", "slider"),
        Selector::any().contains("class", "hero"),
    ]);

    static ref IMAGES: SelectorList = Selector::tag("img").present("src").into();
}

/// Extract product or booking details.
///
/// Returns `None` only when the page text cannot be read at all.
pub fn extract_product_details(page: &impl Page) -> Option<ProductDetails> {
    let body_text = match page.body_text() {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("Body not rendered, no product details");
            return None;
        }
        Err(e) => {
            warn!("Could not read page text: {}", e);
            return None;
        }
    };

    let details = ProductDetails {
        product_name: product_name(page),
        image: product_image(page),
        location: first_group(&[&*ADDRESS_POSTAL, &*ADDRESS_UAE, &*ADDRESS_REGION], &body_text),
        rating: RATING.find(&body_text).map(|m| m.as_str().to_string()),
        check_in: first_group(&[&*CHECK_IN_LONG, &*CHECK_IN_NUMERIC], &body_text),
        check_out: first_group(&[&*CHECK_OUT_LONG, &*CHECK_OUT_NUMERIC], &body_text),
        duration: first_group(&[&*DURATION], &body_text),
        additional_info: additional_info(&body_text),
    };

    debug!("Product details: {:?}", details);
    Some(details)
}

fn product_name(page: &impl Page) -> Option<String> {
    let by_class = query(page, &PROPERTY_NAMES)
        .into_iter()
        .map(|e| e.trimmed_text().to_string())
        .find(|text| in_name_band(text));
    if by_class.is_some() {
        return by_class;
    }

    let by_heading = query(page, &HEADINGS).into_iter().find_map(|heading| {
        let text = heading.trimmed_text();
        let lower = text.to_lowercase();
        if !in_name_band(text) || HEADING_STOP_WORDS.iter().any(|w| lower.contains(w)) {
            return None;
        }

        let class = heading.class_name().to_lowercase();
        let looks_like_name = heading.tag == "h1"
            || heading.tag == "h2"
            || ["hotel", "property", "name"].iter().any(|w| class.contains(w));
        looks_like_name.then(|| text.to_string())
    });
    if by_heading.is_some() {
        return by_heading;
    }

    query(page, &OG_TITLE)
        .first()
        .and_then(|meta| meta.attr("content"))
        .map(|content| content.split('|').next().unwrap_or("").trim().to_string())
        .filter(|title| in_name_band(title))
}

fn in_name_band(text: &str) -> bool {
    let len = text.chars().count();
    len > 5 && len < 100
}

fn product_image(page: &impl Page) -> Option<String> {
    background_image(page)
        .or_else(|| hinted_image(page))
        .or_else(|| largest_image(page))
}

fn background_image(page: &impl Page) -> Option<String> {
    for element in query(page, &BACKGROUND_CANDIDATES) {
        let value = match page.background_image(&element) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                debug!("No computed style for {}: {}", element.describe(), e);
                continue;
            }
        };

        let url = match CSS_URL.captures(&value).and_then(|c| c.get(1)) {
            Some(m) if !m.as_str().is_empty() => m.as_str(),
            _ => continue,
        };

        let lower = url.to_lowercase();
        if !contains_any(&lower, BACKGROUND_REJECT) && contains_any(&lower, IMAGE_EXTENSIONS) {
            debug!("Using background image of {}", element.describe());
            return Some(page.resolve_url(url));
        }
    }
    None
}

fn hinted_image(page: &impl Page) -> Option<String> {
    query(page, &IMAGES).into_iter().find_map(|img| {
        let src = page.resolve_url(img.attr_or_empty("src"));
        let lower_src = src.to_lowercase();
        if img.width <= 200 || img.height <= 150 || contains_any(&lower_src, IMAGE_REJECT) {
            return None;
        }

        let alt = img.attr_or_empty("alt").to_lowercase();
        let class = img.class_name().to_lowercase();
        let hinted = contains_any(&alt, IMAGE_HINTS)
            || contains_any(&class, IMAGE_HINTS)
            || class.contains("main")
            || img.width > 400;
        hinted.then_some(src)
    })
}

fn largest_image(page: &impl Page) -> Option<String> {
    query(page, &IMAGES)
        .into_iter()
        .filter(|img| img.width > 250 && img.height > 150)
        .map(|img| (area(&img), page.resolve_url(img.attr_or_empty("src"))))
        .filter(|(_, src)| !contains_any(&src.to_lowercase(), BACKGROUND_REJECT))
        .fold(None, |best: Option<(u64, String)>, candidate| match best {
            Some(best) if best.0 >= candidate.0 => Some(best),
            _ => Some(candidate),
        })
        .map(|(_, src)| src)
}

fn area(element: &PageElement) -> u64 {
    u64::from(element.width) * u64::from(element.height)
}

fn additional_info(text: &str) -> Vec<String> {
    let mut info = Vec::new();
    if let Some(caps) = GUESTS.captures(text) {
        info.push(caps[1].to_string());
    }
    if let Some(caps) = CANCELLATION.captures(text) {
        info.push(caps[1].trim().to_string());
    }
    if let Some(m) = BREAKFAST.find(text) {
        info.push(m.as_str().to_string());
    }
    info
}

fn first_group(patterns: &[&Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Query that treats a page error as no elements.
fn query(page: &impl Page, selectors: &SelectorList) -> Vec<PageElement> {
    page.query(selectors).unwrap_or_else(|e| {
        debug!("Query {} failed: {}", selectors, e);
        Vec::new()
    })
}
