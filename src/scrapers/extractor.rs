//! Article extraction from detail pages.
//!
//! Each collected link is loaded in the browser and parsed from the rendered
//! HTML. An article is only kept when title, image, and content were all
//! found; anything else is discarded with a categorized reason and the loop
//! moves on to the next link. There are no retries.
//!
//! The image comes from the `src` of the source's image selector. When that
//! element is absent or carries no usable `src` (lazy-loaded images often only
//! set `data-src`), the extractor falls back to the page's `og:image` metadata.

use crate::browser::{BrowserError, PageContext};
use crate::config::Settings;
use crate::models::{Article, ArticleLink, Source, SourceSelectors};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("static selector"));

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Why a link did not produce an [`Article`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscardReason {
    #[error("image was not found")]
    MissingImage,
    #[error("title was not found")]
    MissingTitle,
    #[error("content was not found")]
    MissingContent,
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("page could not be loaded: {0}")]
    Navigation(String),
}

/// Knobs for [`fetch_articles`].
#[derive(Debug, Clone, Copy)]
pub struct ExtractorOptions {
    /// Soft wait for the image element; some templates fade images in.
    pub image_wait: Duration,
}

impl From<&Settings> for ExtractorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            image_wait: settings.image_wait(),
        }
    }
}

/// Running counters across all sources of a scrape stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub national: usize,
    pub local: usize,
    pub missing_image: usize,
    pub missing_title: usize,
    pub missing_content: usize,
    pub failed: usize,
}

impl ExtractionStats {
    fn accept(&mut self, national: bool) {
        if national {
            self.national += 1;
        } else {
            self.local += 1;
        }
    }

    fn discard(&mut self, reason: &DiscardReason) {
        match reason {
            DiscardReason::MissingImage => self.missing_image += 1,
            DiscardReason::MissingTitle => self.missing_title += 1,
            DiscardReason::MissingContent => self.missing_content += 1,
            DiscardReason::InvalidSelector { .. } | DiscardReason::Navigation(_) => {
                self.failed += 1
            }
        }
    }

    pub fn accepted(&self) -> usize {
        self.national + self.local
    }

    pub fn discarded(&self) -> usize {
        self.missing_image + self.missing_title + self.missing_content + self.failed
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DiscardReason> {
    Selector::parse(selector).map_err(|e| DiscardReason::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Approximate `innerText`: block elements break lines, whitespace inside a
/// line collapses, blank lines disappear, scripts and styles are skipped.
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}

/// Text of the container's direct children named `tag`, one per line.
fn top_level_text(container: ElementRef<'_>, tag: &str) -> String {
    container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name().eq_ignore_ascii_case(tag))
        .map(inner_text)
        .filter(|text| !text.is_empty())
        .join("\n")
}

fn resolve(page_url: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match Url::parse(page_url) {
        Ok(base) => base.join(value).ok().map(|u| u.to_string()),
        Err(_) => Some(value.to_string()),
    }
}

/// Parse an article out of a rendered detail page.
///
/// # Errors
///
/// Returns the first missing field in the order image, title, content, or
/// [`DiscardReason::InvalidSelector`] if a configured selector does not parse.
pub fn parse_article(
    html: &str,
    page_url: &str,
    href: &str,
    selectors: &SourceSelectors,
    national_news: bool,
) -> Result<Article, DiscardReason> {
    let title_selector = parse_selector(&selectors.title)?;
    let content_selector = parse_selector(&selectors.content)?;
    let image_selector = parse_selector(&selectors.image)?;
    let document = Html::parse_document(html);

    let title = document
        .select(&title_selector)
        .next()
        .map(inner_text)
        .unwrap_or_default();

    let content = document
        .select(&content_selector)
        .next()
        .map(|container| match selectors.only_read_top_level_tag.as_deref() {
            Some(tag) if !tag.trim().is_empty() => top_level_text(container, tag.trim()),
            _ => inner_text(container),
        })
        .unwrap_or_default();

    let image = document
        .select(&image_selector)
        .next()
        .and_then(|element| element.value().attr("src"))
        .and_then(|src| resolve(page_url, src))
        .or_else(|| {
            let og = document
                .select(&OG_IMAGE)
                .filter_map(|meta| meta.value().attr("content"))
                .find_map(|content| resolve(page_url, content));
            if og.is_none() {
                debug!(%href, "Could not pull open graph image");
            }
            og
        });

    let Some(image) = image else {
        return Err(DiscardReason::MissingImage);
    };
    if title.is_empty() {
        return Err(DiscardReason::MissingTitle);
    }
    if content.is_empty() {
        return Err(DiscardReason::MissingContent);
    }

    Ok(Article {
        href: href.to_string(),
        title,
        content,
        image,
        perspective: None,
        national_news,
    })
}

/// Load one link and parse it.
#[instrument(level = "debug", skip_all, fields(href = %link.href))]
pub async fn fetch_article<P: PageContext>(
    page: &P,
    link: &ArticleLink,
    source: &Source,
    options: &ExtractorOptions,
) -> Result<Article, DiscardReason> {
    let navigation = |e: BrowserError| DiscardReason::Navigation(e.to_string());

    page.navigate(&link.href).await.map_err(navigation)?;
    if !page
        .wait_for_selector(&source.selectors.image, options.image_wait)
        .await
        .is_ready()
    {
        debug!("Image did not become visible; extracting anyway");
    }
    let html = page.content().await.map_err(navigation)?;
    let page_url = page
        .current_url()
        .await
        .ok()
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| link.href.clone());

    parse_article(
        &html,
        &page_url,
        &link.href,
        &source.selectors,
        source.national_news_source,
    )
}

/// Fetch content for every link of a source, keeping the well-formed articles.
#[instrument(level = "info", skip_all, fields(source = %source.base_url, links = links.len()))]
pub async fn fetch_articles<P: PageContext>(
    page: &P,
    source: &Source,
    links: &[ArticleLink],
    options: &ExtractorOptions,
    stats: &mut ExtractionStats,
) -> Vec<Article> {
    let mut articles = Vec::with_capacity(links.len());
    for link in links {
        match fetch_article(page, link, source, options).await {
            Ok(article) => {
                debug!(href = %article.href, "Fetched content");
                stats.accept(article.national_news);
                articles.push(article);
            }
            Err(reason) => {
                warn!(href = %link.href, %reason, "Discarding article");
                stats.discard(&reason);
            }
        }
    }
    info!(
        fetched = articles.len(),
        discarded = links.len() - articles.len(),
        "Fetched article contents"
    );
    articles
}
