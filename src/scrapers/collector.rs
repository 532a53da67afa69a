//! Link collection from paginated listing pages.
//!
//! A listing page is scanned repeatedly: every scan reads the anchors that are
//! currently in the document, merges them into an [`IndexSet`], and then either
//! stops or clicks the pagination control to reveal more.
//!
//! ```text
//! Scanning ──► NoNewLinks
//!          ├─► NoPaginationConfigured
//!          ├─► MaxReached
//!          ├─► ScanLimitReached       (max + 1 scans)
//!          ├─► PaginationMissing
//!          ├─► PaginationFailed       (click or read error after the first scan)
//!          ├─► SoftTimeoutStop        (only with SoftTimeoutPolicy::Stop)
//!          └─► click ─► wait ─► Scanning
//! ```
//!
//! A navigation wait that times out is not an error. "Load more" buttons often
//! render new links without any navigation event, so by default the same page
//! is scanned again. A rescan after a soft timeout that finds nothing new does
//! not end the loop, since the content may still be rendering; only the scan
//! budget stops a control that keeps clicking without ever adding links.
//!
//! Once the first scan succeeded, browser errors never discard what was
//! collected: the loop ends with `PaginationFailed` and returns the links.

use crate::browser::{BrowserError, PageContext, WaitOutcome};
use crate::config::{Settings, SoftTimeoutPolicy};
use crate::models::{ArticleLink, Source};
use indexmap::IndexSet;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Knobs for [`index_articles`].
#[derive(Debug, Clone, Copy)]
pub struct CollectorOptions {
    pub pagination_wait: Duration,
    pub soft_timeout_policy: SoftTimeoutPolicy,
}

impl From<&Settings> for CollectorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            pagination_wait: settings.pagination_wait(),
            soft_timeout_policy: settings.soft_timeout_policy,
        }
    }
}

/// Why a collection loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// A scan did not add any link.
    NoNewLinks,
    /// The source has no pagination selector.
    NoPaginationConfigured,
    /// `maxNumberOfArticles` links have been collected.
    MaxReached,
    /// The pagination control is not on the page.
    PaginationMissing,
    /// Clicking the pagination control, or reading the page after a click,
    /// failed in the browser.
    PaginationFailed,
    /// A navigation wait timed out and the policy says stop.
    SoftTimeoutStop,
    /// `maxNumberOfArticles + 1` scans ran without reaching the maximum.
    /// Only soft-timeout rescans that add nothing can get here.
    ScanLimitReached,
}

/// Links harvested from one source.
#[derive(Debug, Clone)]
pub struct Collection {
    /// First-seen order, at most `maxNumberOfArticles` entries.
    pub links: Vec<ArticleLink>,
    pub outcome: CollectionOutcome,
    pub scans: usize,
}

/// Extract the absolute `href` of every anchor matching `selector`.
///
/// Relative links are resolved against `page_url`; anchors without an `href`
/// or with an unresolvable one are skipped.
pub fn extract_links(html: &str, page_url: &str, selector: &Selector) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| match &base {
            Some(base) => base.join(href).ok().map(|u| u.to_string()),
            None => Url::parse(href).ok().map(|u| u.to_string()),
        })
        .collect()
}

async fn read_listing<P: PageContext>(page: &P) -> Result<(String, String), BrowserError> {
    let html = page.content().await?;
    let page_url = page.current_url().await?;
    Ok((html, page_url))
}

/// Harvest article links from a source's listing page.
///
/// # Errors
///
/// Returns a [`BrowserError`] if the listing page cannot be loaded or its
/// first scan cannot be read. Everything after that ends the loop with a
/// [`CollectionOutcome`] and keeps the links found so far.
#[instrument(level = "info", skip_all, fields(source = %source.base_url))]
pub async fn index_articles<P: PageContext>(
    page: &P,
    source: &Source,
    options: &CollectorOptions,
) -> Result<Collection, BrowserError> {
    let max = source.max_articles();
    let anchor = Selector::parse(&source.selectors.anchor).map_err(|e| {
        BrowserError::Script(format!(
            "invalid anchor selector {:?}: {e}",
            source.selectors.anchor
        ))
    })?;
    let pagination = source
        .selectors
        .pagination
        .as_deref()
        .filter(|s| !s.trim().is_empty());

    info!(max, "Scraping listing page for articles");
    page.navigate(&source.base_url).await?;

    let mut links: IndexSet<String> = IndexSet::new();
    let mut scans = 0usize;
    let mut after_soft_timeout = false;
    let scan_limit = max + 1;

    let outcome = loop {
        let (html, page_url) = match read_listing(page).await {
            Ok(read) => read,
            Err(e) if scans > 0 => {
                warn!(error = %e, "Could not read listing after pagination; keeping collected links");
                break CollectionOutcome::PaginationFailed;
            }
            Err(e) => return Err(e),
        };
        scans += 1;

        let found = extract_links(&html, &page_url, &anchor);
        let found_count = found.len();
        let added = found.into_iter().map(|href| links.insert(href)).filter(|&new| new).count();
        debug!(scan = scans, found = found_count, added, total = links.len(), "Scanned listing");

        if added == 0 {
            if !after_soft_timeout {
                info!("No new articles after pagination; finishing");
                break CollectionOutcome::NoNewLinks;
            }
            debug!("Nothing new yet after soft timeout; paginating again");
        }
        let Some(pagination) = pagination else {
            info!("No pagination configured; finishing");
            break CollectionOutcome::NoPaginationConfigured;
        };
        if links.len() >= max {
            info!(max, "Max amount of articles collected; finishing");
            break CollectionOutcome::MaxReached;
        }
        if scans >= scan_limit {
            warn!(scans, "Scan limit reached before pagination ended");
            break CollectionOutcome::ScanLimitReached;
        }
        match page.click(pagination).await {
            Ok(true) => {}
            Ok(false) => {
                info!(%pagination, "Could not find pagination element; finishing");
                break CollectionOutcome::PaginationMissing;
            }
            Err(e) => {
                warn!(%pagination, error = %e, "Pagination click failed; keeping collected links");
                break CollectionOutcome::PaginationFailed;
            }
        }

        after_soft_timeout = match page.wait_for_navigation(options.pagination_wait).await {
            WaitOutcome::Ready => {
                debug!("Navigated to next page");
                false
            }
            WaitOutcome::SoftTimeout => match options.soft_timeout_policy {
                SoftTimeoutPolicy::Rescan => {
                    debug!("No navigation after pagination click; rescanning same page");
                    true
                }
                SoftTimeoutPolicy::Stop => {
                    info!("No navigation after pagination click; finishing");
                    break CollectionOutcome::SoftTimeoutStop;
                }
            },
        };
    };

    let collected = links.len();
    let links: Vec<ArticleLink> = links
        .into_iter()
        .take(max)
        .map(|href| ArticleLink { href })
        .collect();
    info!(
        collected,
        kept = links.len(),
        scans,
        ?outcome,
        "Collected article links"
    );
    Ok(Collection {
        links,
        outcome,
        scans,
    })
}
