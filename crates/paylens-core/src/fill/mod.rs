//! Payment field autofill.
//!
//! Fields are located fresh on every fill because host pages re-render their
//! forms. Values go through the host's native setter followed by
//! `input`, `change` and `blur` so framework-managed inputs pick them up.

mod selectors;

pub use selectors::FieldRole;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::CardCredential;
use crate::page::{FieldEvent, FormHost, Page, PageElement, Result};
use crate::session::{Affordance, NoticeKind, Surface};

/// Notification shown once a fill completes.
pub const FILLED_NOTICE: &str = "Card details filled automatically!";

/// A role bound to the element that will receive its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldBinding {
    pub role: FieldRole,
    pub element: PageElement,
}

/// How the expiry date was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    /// Separate month and year fields.
    Separate,
    /// One `MM/YY` field.
    Combined,
    NotFound,
}

/// Outcome of one autofill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Bindings that were written (or attempted).
    pub bindings: Vec<FieldBinding>,
    pub filled: Vec<FieldRole>,
    pub missing: Vec<FieldRole>,
    /// Roles whose write failed, with the reason.
    pub failed: Vec<(FieldRole, String)>,
    pub expiry_mode: ExpiryMode,
}

impl FillReport {
    fn new() -> Self {
        Self {
            bindings: Vec::new(),
            filled: Vec::new(),
            missing: Vec::new(),
            failed: Vec::new(),
            expiry_mode: ExpiryMode::NotFound,
        }
    }

    /// Element bound to a role.
    pub fn binding(&self, role: FieldRole) -> Option<&PageElement> {
        self.bindings
            .iter()
            .find(|b| b.role == role)
            .map(|b| &b.element)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}

/// Locate the element for a role: first rank with a match, first element
/// in document order.
pub fn find_field(page: &impl Page, role: FieldRole) -> Result<Option<PageElement>> {
    for (rank, selectors) in role.ranks().iter().enumerate() {
        if let Some(element) = page.query_first(selectors)? {
            debug!("{} field {} matched rank {}", role, element.describe(), rank);
            return Ok(Some(element));
        }
    }
    Ok(None)
}

/// Fill the payment form from a credential.
///
/// Missing fields and failed writes are recorded, never fatal. However many
/// fields were filled, the surface shows the success notice and switches to
/// the confirm affordance.
pub fn autofill<H, S>(host: &mut H, surface: &mut S, credential: &CardCredential) -> FillReport
where
    H: FormHost,
    S: Surface + ?Sized,
{
    let mut report = FillReport::new();

    fill_role(host, &mut report, FieldRole::CardNumber, &credential.pan);
    fill_expiry(host, &mut report, credential);
    fill_role(host, &mut report, FieldRole::Cvv, &credential.cvv);

    if let Some(name) = credential.cardholder_name.as_deref().filter(|n| !n.is_empty()) {
        fill_role(host, &mut report, FieldRole::Name, name);
    }

    info!(
        "Autofill finished: {} filled, {} missing, {} failed ({:?} expiry)",
        report.filled.len(),
        report.missing.len(),
        report.failed.len(),
        report.expiry_mode
    );

    surface.notify(FILLED_NOTICE, NoticeKind::Success);
    surface.set_affordance(Affordance::Confirm);

    report
}

fn fill_expiry<H: FormHost>(host: &mut H, report: &mut FillReport, credential: &CardCredential) {
    let month = locate(host, report, FieldRole::Month);
    let year = locate(host, report, FieldRole::Year);

    if let (Some(month), Some(year)) = (month, year) {
        report.expiry_mode = ExpiryMode::Separate;
        write_binding(host, report, FieldRole::Month, month, &credential.month_mm());
        write_binding(host, report, FieldRole::Year, year, &credential.year_yy());
        return;
    }

    match locate(host, report, FieldRole::Expiry) {
        Some(combined) => {
            report.expiry_mode = ExpiryMode::Combined;
            write_binding(host, report, FieldRole::Expiry, combined, &credential.expiry_mm_yy());
        }
        None => {
            warn!("No expiry field found");
            report.expiry_mode = ExpiryMode::NotFound;
            report.missing.push(FieldRole::Expiry);
        }
    }
}

fn fill_role<H: FormHost>(host: &mut H, report: &mut FillReport, role: FieldRole, value: &str) {
    match locate(host, report, role) {
        Some(element) => write_binding(host, report, role, element, value),
        None => {
            warn!("No {} field found", role);
            report.missing.push(role);
        }
    }
}

/// Find a field; a failed lookup counts as a failure for the role.
fn locate<H: FormHost>(host: &H, report: &mut FillReport, role: FieldRole) -> Option<PageElement> {
    match find_field(host, role) {
        Ok(found) => found,
        Err(e) => {
            warn!("Lookup for {} field failed: {}", role, e);
            report.failed.push((role, e.to_string()));
            None
        }
    }
}

fn write_binding<H: FormHost>(
    host: &mut H,
    report: &mut FillReport,
    role: FieldRole,
    element: PageElement,
    value: &str,
) {
    match write_value(host, &element, value) {
        Ok(()) => {
            info!("Filled {} field {}", role, element.describe());
            report.filled.push(role);
        }
        Err(e) => {
            warn!("Could not fill {} field {}: {}", role, element.describe(), e);
            report.failed.push((role, e.to_string()));
        }
    }
    report.bindings.push(FieldBinding { role, element });
}

/// Native value set, then the notification sequence.
fn write_value<H: FormHost>(host: &mut H, element: &PageElement, value: &str) -> Result<()> {
    host.set_value(element.handle, value)?;
    for event in FieldEvent::SEQUENCE {
        host.dispatch(element.handle, event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::HtmlPage;
    use crate::session::RecordingSurface;
    use pretty_assertions::assert_eq;

    fn card(name: Option<&str>) -> CardCredential {
        CardCredential {
            pan: "4111111111111111".to_string(),
            cvv: "737".to_string(),
            exp_month: 3,
            exp_year: 2032,
            cardholder_name: name.map(str::to_string),
        }
    }

    fn value_of(page: &HtmlPage, report: &FillReport, role: FieldRole) -> Option<String> {
        report
            .binding(role)
            .and_then(|e| page.value(e.handle))
            .map(str::to_string)
    }

    #[test]
    fn test_separate_fields_win_over_combined_decoy() {
        let html = r#"<form>
            <input name="cardnumber">
            <input name="expiry" id="decoy" placeholder="MM / YY">
            <select name="exp_month"><option>01</option></select>
            <input name="exp_year">
            <input name="cvc">
        </form>"#;
        let mut page = HtmlPage::parse("https://shop.example/checkout", html);
        let mut surface = RecordingSurface::new();

        let report = autofill(&mut page, &mut surface, &card(None));

        assert_eq!(report.expiry_mode, ExpiryMode::Separate);
        assert_eq!(value_of(&page, &report, FieldRole::Month).as_deref(), Some("03"));
        assert_eq!(value_of(&page, &report, FieldRole::Year).as_deref(), Some("32"));
        assert!(report.binding(FieldRole::Expiry).is_none());

        let decoy = page
            .elements()
            .iter()
            .find(|e| e.id() == "decoy")
            .map(|e| e.handle)
            .unwrap();
        assert_eq!(page.value(decoy), None);
        assert!(page.events().iter().all(|(handle, _)| *handle != decoy));
    }

    #[test]
    fn test_combined_field_gets_mm_yy() {
        let html = r#"<form>
            <input id="card-number" autocomplete="cc-number">
            <input name="cc-exp" placeholder="MM/YY">
            <input name="security-code">
            <input name="cardholder-name">
        </form>"#;
        let mut page = HtmlPage::parse("https://shop.example/checkout", html);
        let mut surface = RecordingSurface::new();

        let report = autofill(&mut page, &mut surface, &card(Some("Ada Lovelace")));

        assert_eq!(report.expiry_mode, ExpiryMode::Combined);
        assert_eq!(value_of(&page, &report, FieldRole::CardNumber).as_deref(), Some("4111111111111111"));
        assert_eq!(value_of(&page, &report, FieldRole::Expiry).as_deref(), Some("03/32"));
        assert_eq!(value_of(&page, &report, FieldRole::Cvv).as_deref(), Some("737"));
        assert_eq!(value_of(&page, &report, FieldRole::Name).as_deref(), Some("Ada Lovelace"));
        assert!(report.is_complete());
    }

    #[test]
    fn test_events_follow_each_write() {
        let mut page = HtmlPage::parse(
            "https://shop.example/checkout",
            r#"<input name="cardnumber">"#,
        );
        let mut surface = RecordingSurface::new();
        let report = autofill(&mut page, &mut surface, &card(None));

        let handle = report.binding(FieldRole::CardNumber).unwrap().handle;
        let events: Vec<FieldEvent> = page
            .events()
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, e)| *e)
            .collect();
        assert_eq!(events, FieldEvent::SEQUENCE.to_vec());
    }

    #[test]
    fn test_partial_fill_still_completes() {
        let mut page = HtmlPage::parse(
            "https://shop.example/checkout",
            r#"<input name="cardnumber"><input name="email">"#,
        );
        let mut surface = RecordingSurface::new();
        let report = autofill(&mut page, &mut surface, &card(Some("Ada")));

        assert_eq!(report.filled, vec![FieldRole::CardNumber]);
        assert_eq!(
            report.missing,
            vec![FieldRole::Expiry, FieldRole::Cvv, FieldRole::Name]
        );
        assert_eq!(report.expiry_mode, ExpiryMode::NotFound);
        assert_eq!(surface.notices(), vec![(FILLED_NOTICE, NoticeKind::Success)]);
        assert_eq!(surface.affordance(), Some(Affordance::Confirm));
    }

    #[test]
    fn test_nothing_found_still_notifies() {
        let mut page = HtmlPage::parse("https://shop.example/checkout", "<p>No form</p>");
        let mut surface = RecordingSurface::new();
        let report = autofill(&mut page, &mut surface, &card(None));

        assert!(report.filled.is_empty());
        assert!(!report.missing.contains(&FieldRole::Name));
        assert_eq!(surface.affordance(), Some(Affordance::Confirm));
    }

    /// Wraps a page and rejects writes to one element.
    struct RejectingHost {
        page: HtmlPage,
        reject: &'static str,
    }

    impl Page for RejectingHost {
        fn url(&self) -> String {
            self.page.url()
        }

        fn title(&self) -> Result<String> {
            self.page.title()
        }

        fn body_text(&self) -> Result<Option<String>> {
            self.page.body_text()
        }

        fn query(&self, selectors: &crate::page::SelectorList) -> Result<Vec<PageElement>> {
            self.page.query(selectors)
        }

        fn background_image(&self, element: &PageElement) -> Result<Option<String>> {
            self.page.background_image(element)
        }
    }

    impl FormHost for RejectingHost {
        fn set_value(&mut self, element: crate::page::ElementHandle, value: &str) -> Result<()> {
            let rejected = self
                .page
                .element(element)
                .is_some_and(|e| e.id() == self.reject);
            if rejected {
                return Err(crate::error::PageError::Interaction("value setter threw".to_string()));
            }
            self.page.set_value(element, value)
        }

        fn dispatch(&mut self, element: crate::page::ElementHandle, event: FieldEvent) -> Result<()> {
            self.page.dispatch(element, event)
        }
    }

    #[test]
    fn test_failed_write_does_not_stop_other_fields() {
        let html = r#"<input name="cardnumber"><input name="expiry">
            <input id="cvv" name="cvv">"#;
        let mut host = RejectingHost {
            page: HtmlPage::parse("https://shop.example/checkout", html),
            reject: "cvv",
        };
        let mut surface = RecordingSurface::new();
        let report = autofill(&mut host, &mut surface, &card(None));

        assert_eq!(report.filled, vec![FieldRole::CardNumber, FieldRole::Expiry]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, FieldRole::Cvv);
        assert!(report.missing.is_empty());
        assert_eq!(surface.affordance(), Some(Affordance::Confirm));
    }
}
