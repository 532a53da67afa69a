//! In-memory [`PageContext`] for tests.
//!
//! Documents are static HTML keyed by URL. A listing URL can instead serve a
//! sequence of pages that advances every time the pagination control is
//! clicked. Mutation patches act on a fake element table keyed by selector.

use super::{BrowserError, DomPatch, PageContext, Scope, WaitOutcome};
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeElement {
    pub text: String,
    pub class_name: String,
    pub src: String,
    pub srcset: String,
    pub styles: BTreeMap<String, String>,
    pub removed: bool,
}

#[derive(Default)]
struct State {
    current: String,
    listing_cursor: usize,
    clicks: usize,
    scans: usize,
    navigations: Vec<String>,
    elements: HashMap<String, Vec<FakeElement>>,
}

#[derive(Default)]
pub struct FakePage {
    documents: HashMap<String, String>,
    listing_url: String,
    listing_pages: Vec<String>,
    navigation_outcome: Option<WaitOutcome>,
    unreachable: HashSet<String>,
    failing_selectors: HashSet<String>,
    broken_images: HashSet<String>,
    stalled_images: HashSet<String>,
    click_error_after: Option<usize>,
    state: Mutex<State>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, html: &str) -> Self {
        self.documents.insert(url.to_string(), html.to_string());
        self
    }

    /// Serve `pages` at `url`; each successful pagination click advances one
    /// page and the last page keeps being served.
    pub fn with_listing(mut self, url: &str, pages: Vec<String>) -> Self {
        self.listing_url = url.to_string();
        self.listing_pages = pages;
        self
    }

    pub fn with_navigation_outcome(mut self, outcome: WaitOutcome) -> Self {
        self.navigation_outcome = Some(outcome);
        self
    }

    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn with_elements(self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), elements);
        self
    }

    pub fn with_texts(self, selector: &str, texts: &[&str]) -> Self {
        let elements = texts
            .iter()
            .map(|text| FakeElement {
                text: text.to_string(),
                ..FakeElement::default()
            })
            .collect();
        self.with_elements(selector, elements)
    }

    pub fn with_failing_selector(mut self, selector: &str) -> Self {
        self.failing_selectors.insert(selector.to_string());
        self
    }

    pub fn with_broken_image(mut self, src: &str) -> Self {
        self.broken_images.insert(src.to_string());
        self
    }

    pub fn with_stalled_image(mut self, src: &str) -> Self {
        self.stalled_images.insert(src.to_string());
        self
    }

    /// Make every pagination click after the first `clicks` fail the way
    /// Chromium does when the control has no box model.
    pub fn with_click_error_after(mut self, clicks: usize) -> Self {
        self.click_error_after = Some(clicks);
        self
    }

    pub fn elements(&self, selector: &str) -> Vec<FakeElement> {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    /// Number of times the listing page HTML was read.
    pub fn scans(&self) -> usize {
        self.state.lock().unwrap().scans
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn current_html(&self, state: &State) -> String {
        if !self.listing_url.is_empty() && state.current == self.listing_url {
            let last = self.listing_pages.len().saturating_sub(1);
            return self
                .listing_pages
                .get(state.listing_cursor.min(last))
                .cloned()
                .unwrap_or_default();
        }
        self.documents.get(&state.current).cloned().unwrap_or_default()
    }

    fn html_has(&self, html: &str, selector: &str) -> bool {
        let Ok(parsed) = Selector::parse(selector) else {
            return false;
        };
        Html::parse_document(html).select(&parsed).next().is_some()
    }
}

impl PageContext for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        if self.unreachable.contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.listing_cursor = 0;
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.current == self.listing_url {
            state.scans += 1;
        }
        Ok(self.current_html(&state))
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let mut state = self.state.lock().unwrap();
        let html = self.current_html(&state);
        if !self.html_has(&html, selector) {
            return Ok(false);
        }
        if self.click_error_after.is_some_and(|limit| state.clicks >= limit) {
            return Err(BrowserError::Click {
                selector: selector.to_string(),
                reason: "Could not compute box model.".to_string(),
            });
        }
        state.clicks += 1;
        if state.current == self.listing_url {
            state.listing_cursor += 1;
        }
        Ok(true)
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> WaitOutcome {
        let state = self.state.lock().unwrap();
        if self.html_has(&self.current_html(&state), selector) {
            WaitOutcome::Ready
        } else {
            WaitOutcome::SoftTimeout
        }
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> WaitOutcome {
        self.navigation_outcome.unwrap_or(WaitOutcome::Ready)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn apply_patch(
        &self,
        selector: &str,
        scope: Scope,
        patch: &DomPatch,
    ) -> Result<usize, BrowserError> {
        if self.failing_selectors.contains(selector) {
            return Err(BrowserError::Script(format!(
                "SyntaxError: '{selector}' is not a valid selector"
            )));
        }
        let mut state = self.state.lock().unwrap();
        let Some(elements) = state.elements.get_mut(selector) else {
            return Ok(0);
        };
        let live = elements.iter_mut().filter(|e| !e.removed);
        let targets: Vec<&mut FakeElement> = match scope {
            Scope::First => live.take(1).collect(),
            Scope::All => live.collect(),
        };
        let count = targets.len();
        for (i, el) in targets.into_iter().enumerate() {
            match patch {
                DomPatch::SetText(text) => el.text = text.clone(),
                DomPatch::SetStyles(styles) => {
                    for (property, value) in styles {
                        el.styles.insert(property.clone(), value.clone());
                    }
                }
                DomPatch::SetClassName(class_name) => el.class_name = class_name.clone(),
                DomPatch::Remove => el.removed = true,
                DomPatch::ReplaceTags(tags) => match tags.get(i) {
                    Some(tag) => el.text = tag.clone(),
                    None => {
                        el.styles.insert("display".to_string(), "none".to_string());
                    }
                },
            }
        }
        Ok(count)
    }

    async fn load_image(&self, selector: &str, src: &str) -> Result<usize, BrowserError> {
        if self.stalled_images.contains(src) {
            std::future::pending::<()>().await;
        }
        {
            let mut state = self.state.lock().unwrap();
            let Some(el) = state
                .elements
                .get_mut(selector)
                .and_then(|elements| elements.iter_mut().find(|e| !e.removed))
            else {
                return Ok(0);
            };
            el.srcset.clear();
            el.src = src.to_string();
            el.styles
                .insert("object-fit".to_string(), "cover".to_string());
        }
        if self.broken_images.contains(src) {
            return Err(BrowserError::Script(format!(
                "Error: image failed to load: {src}"
            )));
        }
        Ok(1)
    }
}
