//! Concurrent application of mutation operations to a live page.
//!
//! All operations of one article start together and are joined by a single
//! barrier that waits for every one of them; a failing operation never
//! short-circuits its siblings. Each operation settles into an
//! [`OperationOutcome`], and the barrier folds them into a [`MutationReport`]
//! so failures stay observable.
//!
//! # Settle delay
//!
//! Image swaps wait an extra fixed delay after the change. CSS background
//! images fire no load event at all, and `<img>` load events fire before
//! the new picture is painted.

use super::{FillMode, MutationKind, MutationOperation, ROOT_SELECTOR};
use crate::browser::{BrowserError, DomPatch, PageContext, Scope};
use crate::config::Settings;
use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Why a single operation failed.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("image {src} did not load within {timeout:?}")]
    ImageLoadTimeout { src: String, timeout: Duration },
}

/// How one operation settled.
#[derive(Debug)]
pub enum OperationOutcome {
    /// The operation changed this many elements.
    Applied(usize),
    /// The selector matched nothing; treated as a successful no-op.
    Missing,
    Failed(MutationError),
}

/// A failed operation, identified by its position in the input list.
#[derive(Debug)]
pub struct OperationError {
    pub index: usize,
    pub kind: MutationKind,
    pub selector: String,
    pub error: MutationError,
}

/// Result of applying one batch of operations.
#[derive(Debug, Default)]
pub struct MutationReport {
    /// `true` when no operation failed.
    pub succeeded: bool,
    /// Operations that matched at least one element.
    pub applied: usize,
    /// Elements changed across all applied operations.
    pub changed: usize,
    pub missing: usize,
    pub errors: Vec<OperationError>,
}

/// Applies compiled operations to a page.
#[derive(Debug, Clone, Copy)]
pub struct MutationExecutor {
    settle_delay: Duration,
    image_load_timeout: Duration,
}

impl From<&Settings> for MutationExecutor {
    fn from(settings: &Settings) -> Self {
        Self::new(settings.settle_delay(), settings.image_load_timeout())
    }
}

fn css_url(src: &str) -> String {
    format!("url(\"{}\")", src.replace('"', "%22"))
}

fn styles(pairs: &[(&str, &str)]) -> DomPatch {
    DomPatch::SetStyles(
        pairs
            .iter()
            .map(|(property, value)| (property.to_string(), value.to_string()))
            .collect(),
    )
}

impl MutationExecutor {
    pub fn new(settle_delay: Duration, image_load_timeout: Duration) -> Self {
        Self {
            settle_delay,
            image_load_timeout,
        }
    }

    /// Run every operation concurrently and wait for all of them to settle.
    #[instrument(level = "info", skip_all, fields(operations = operations.len()))]
    pub async fn apply<P: PageContext>(
        &self,
        operations: &[MutationOperation],
        page: &P,
    ) -> MutationReport {
        let outcomes = join_all(operations.iter().map(|op| self.run(op, page))).await;

        let mut report = MutationReport::default();
        for (index, (op, outcome)) in operations.iter().zip(outcomes).enumerate() {
            match outcome {
                OperationOutcome::Applied(changed) => {
                    report.applied += 1;
                    report.changed += changed;
                }
                OperationOutcome::Missing => report.missing += 1,
                OperationOutcome::Failed(error) => report.errors.push(OperationError {
                    index,
                    kind: op.kind(),
                    selector: op.selector().to_string(),
                    error,
                }),
            }
        }
        report.succeeded = report.errors.is_empty();

        info!(
            applied = report.applied,
            missing = report.missing,
            failed = report.errors.len(),
            "Applied mutations"
        );
        report
    }

    async fn run<P: PageContext>(&self, op: &MutationOperation, page: &P) -> OperationOutcome {
        match self.execute(op, page).await {
            Ok(0) => {
                debug!(kind = %op.kind(), selector = %op.selector(), "Element not found for selector");
                OperationOutcome::Missing
            }
            Ok(changed) => {
                debug!(kind = %op.kind(), selector = %op.selector(), changed, "Applied mutation");
                OperationOutcome::Applied(changed)
            }
            Err(error) => {
                warn!(kind = %op.kind(), selector = %op.selector(), %error, "Mutation failed");
                OperationOutcome::Failed(error)
            }
        }
    }

    async fn execute<P: PageContext>(
        &self,
        op: &MutationOperation,
        page: &P,
    ) -> Result<usize, MutationError> {
        let changed = match op {
            MutationOperation::SetText { selector, text } => {
                page.apply_patch(selector, Scope::First, &DomPatch::SetText(text.clone()))
                    .await?
            }
            MutationOperation::SetTextAll { selector, text } => {
                page.apply_patch(selector, Scope::All, &DomPatch::SetText(text.clone()))
                    .await?
            }
            MutationOperation::SwapImage {
                selector,
                src,
                fill: FillMode::BackgroundFill,
            } => {
                let url = css_url(src);
                let patch = styles(&[
                    ("background", url.as_str()),
                    ("background-image", url.as_str()),
                    ("background-size", "cover"),
                    ("background-position", "center"),
                ]);
                let changed = page.apply_patch(selector, Scope::First, &patch).await?;
                if changed > 0 {
                    sleep(self.settle_delay).await;
                }
                changed
            }
            MutationOperation::SwapImage {
                selector,
                src,
                fill: FillMode::DirectAttribute,
            } => {
                let changed = timeout(self.image_load_timeout, page.load_image(selector, src))
                    .await
                    .map_err(|_| MutationError::ImageLoadTimeout {
                        src: src.clone(),
                        timeout: self.image_load_timeout,
                    })??;
                if changed > 0 {
                    sleep(self.settle_delay).await;
                }
                changed
            }
            MutationOperation::SetCssVariable { name, value } => {
                let patch = DomPatch::SetStyles(vec![(name.clone(), value.clone())]);
                page.apply_patch(ROOT_SELECTOR, Scope::First, &patch).await?
            }
            MutationOperation::Hide { selector } => {
                let patch = styles(&[("opacity", "0"), ("visibility", "hidden")]);
                page.apply_patch(selector, Scope::All, &patch).await?
            }
            MutationOperation::Delete { selector } => {
                page.apply_patch(selector, Scope::All, &DomPatch::Remove).await?
            }
            MutationOperation::ReplaceTagList { selector, tags } => {
                page.apply_patch(selector, Scope::All, &DomPatch::ReplaceTags(tags.clone()))
                    .await?
            }
            MutationOperation::RewriteClassName {
                selector,
                class_name,
            } => {
                page.apply_patch(
                    selector,
                    Scope::All,
                    &DomPatch::SetClassName(class_name.clone()),
                )
                .await?
            }
            MutationOperation::ApplyStyles { selector, styles } => {
                page.apply_patch(selector, Scope::All, &DomPatch::SetStyles(styles.clone()))
                    .await?
            }
            MutationOperation::OverwriteBackgroundColor { selector, color } => {
                page.apply_patch(selector, Scope::All, &styles(&[("background-color", color.as_str())]))
                    .await?
            }
            MutationOperation::OverwriteColor { selector, color } => {
                page.apply_patch(selector, Scope::All, &styles(&[("color", color.as_str())]))
                    .await?
            }
            MutationOperation::ReplaceName { selector, name } => {
                page.apply_patch(selector, Scope::All, &DomPatch::SetText(name.text()))
                    .await?
            }
        };
        Ok(changed)
    }
}
