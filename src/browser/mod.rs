//! Browser automation capability.
//!
//! The scrapers and the mutation executor depend only on [`PageContext`], a
//! small set of page operations (navigate, evaluate, click, bounded waits,
//! screenshot). [`chromium::ChromiumPage`] implements it over chromiumoxide;
//! tests use an in-memory fake.
//!
//! DOM mutation goes through two provided methods, [`PageContext::apply_patch`]
//! and [`PageContext::load_image`], which render a script with [`script`] and
//! run it through [`PageContext::evaluate`]. Implementations only override them
//! when they have no JavaScript engine.

pub mod chromium;
pub mod script;

#[cfg(test)]
pub mod fake;

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the browser capability.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("click on {selector} failed: {reason}")]
    Click { selector: String, reason: String },
    #[error("page capture failed: {0}")]
    Capture(String),
}

/// Result of a bounded wait. A timeout is never an error on its own; the
/// caller decides what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    SoftTimeout,
}

impl WaitOutcome {
    pub fn is_ready(self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }
}

/// Which of the elements matching a selector a patch applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The first match only (`querySelector`).
    First,
    /// Every match (`querySelectorAll`).
    All,
}

/// An atomic change applied to each targeted element.
#[derive(Debug, Clone, PartialEq)]
pub enum DomPatch {
    /// Replace the element's rendered text.
    SetText(String),
    /// Set inline style properties, given as CSS property names.
    SetStyles(Vec<(String, String)>),
    /// Replace the element's `className`.
    SetClassName(String),
    /// Remove the element from the document.
    Remove,
    /// Write `tags[i]` into the i-th element and hide elements past the end.
    ReplaceTags(Vec<String>),
}

/// One live browser page.
///
/// Methods take `&self` so that a batch of mutations can run concurrently
/// against the same page.
#[allow(async_fn_in_trait)]
pub trait PageContext {
    /// Navigate and wait for the document to load.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// The URL of the current document.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// The serialized HTML of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Evaluate a script expression, awaiting it if it returns a promise.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Click the first element matching `selector`.
    ///
    /// Returns `Ok(false)` if no element matches.
    async fn click(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Wait until an element matching `selector` is visible.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> WaitOutcome;

    /// Wait for a navigation triggered by a previous action.
    async fn wait_for_navigation(&self, timeout: Duration) -> WaitOutcome;

    /// Capture the viewport as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Apply `patch` to the elements matching `selector`; returns how many
    /// elements were changed.
    async fn apply_patch(
        &self,
        selector: &str,
        scope: Scope,
        patch: &DomPatch,
    ) -> Result<usize, BrowserError> {
        let value = self.evaluate(&script::patch(selector, scope, patch)).await?;
        Ok(script::matched_count(&value))
    }

    /// Point the first `<img>` matching `selector` at `src` and wait for its
    /// load event. Returns `Ok(0)` if nothing matched; a load error is an `Err`.
    async fn load_image(&self, selector: &str, src: &str) -> Result<usize, BrowserError> {
        let value = self.evaluate(&script::load_image(selector, src)).await?;
        Ok(script::matched_count(&value))
    }
}
