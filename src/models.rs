//! Data models for sources, templates, and scraped articles.
//!
//! This module defines the records that flow through the pipeline:
//! - [`Source`]: A listing page to scrape, with its selectors and owned articles
//! - [`Template`]: A reference site whose DOM is reused as a skin for rewritten articles
//! - [`ArticleLink`]: A deduplicated link harvested from a listing page
//! - [`Article`]: A validated article with title, content, and image
//! - [`Author`]: A fake byline used to dress rendered pages
//!
//! Every record serializes with camelCase keys. The same shape is used for the
//! YAML sites file and for the persisted JSON snapshots, so a snapshot can be
//! reloaded into the pipeline without a translation step.

use serde::{Deserialize, Serialize};
use indexmap::IndexMap;

/// Fallback for [`Source::max_number_of_articles`] when neither the source nor
/// the settings specify one.
pub const DEFAULT_MAX_ARTICLES: usize = 100;

/// A news listing page to scrape, together with everything needed to render
/// its articles.
///
/// Sources are created from the sites file, filled by the scrape stage, and
/// rewritten in place by the rewrite stage. The template is referenced by name
/// so persisted snapshots stay small and pick up template edits on reload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// The listing URL that the link collector starts from.
    pub base_url: String,
    /// Display name written into the template's name slot.
    pub website_name: String,
    /// Short call-sign style name (e.g. `"WHNY"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_short_name: Option<String>,
    /// Region label used in the "news from" slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    /// Whether this source publishes national (as opposed to local) news.
    #[serde(default)]
    pub national_news_source: bool,
    /// Name of the [`Template`] used to render this source's articles.
    pub template: String,
    /// Key into the perspective table of the sites file.
    pub perspective: String,
    /// Selectors for the listing page and the article detail pages.
    pub selectors: SourceSelectors,
    /// CSS color applied to brand-colored template slots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_brand_color: Option<String>,
    /// Upper bound on harvested links; resolved from settings at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_articles: Option<usize>,
    /// Articles collected for this source.
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl Source {
    /// The effective cap on the number of links collected for this source.
    pub fn max_articles(&self) -> usize {
        self.max_number_of_articles.unwrap_or(DEFAULT_MAX_ARTICLES)
    }
}

/// Selectors used to scrape one source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSelectors {
    /// Matches every article anchor on the listing page.
    pub anchor: String,
    /// The control that reveals more links ("next page", "load more").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    pub title: String,
    pub image: String,
    pub content: String,
    /// When set, only the container's direct children with this tag name
    /// contribute to the content (drops injected ads and widgets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_read_top_level_tag: Option<String>,
}

/// A link harvested from a listing page. `href` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ArticleLink {
    pub href: String,
}

/// A scraped article.
///
/// An `Article` only exists once title, content, and image were all found.
/// The rewrite stage replaces `title` and `content` and records the
/// perspective the text was rewritten under.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub href: String,
    pub title: String,
    pub content: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<String>,
    #[serde(default)]
    pub national_news: bool,
}

impl Article {
    /// Whether the rewrite stage has already processed this article.
    pub fn is_rewritten(&self) -> bool {
        self.perspective.is_some()
    }
}

/// How a template renders an image slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// An `<img>` element; the image is swapped through its `src` attribute.
    #[default]
    Img,
    /// A container whose image is a CSS background.
    Background,
}

/// An image slot in a template.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSlot {
    pub selector: String,
    #[serde(default)]
    pub kind: ElementKind,
}

/// Replaces the `className` of every element matching `selector`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNameRewrite {
    pub selector: String,
    pub class_name: String,
}

/// Inline styles applied to every element matching `selector`, in the order
/// they are declared so a later shorthand can reset an earlier longhand.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SelectorStyle {
    pub selector: String,
    #[serde(alias = "style")]
    pub styles: IndexMap<String, String>,
}

/// A reference site whose article page is reused as a skin.
///
/// Every selector is optional: a template only declares the slots its layout
/// actually has, and the compiler emits nothing for the rest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Template {
    /// The article page that is loaded and mutated.
    pub base_url: String,
    pub title_selector: Option<String>,
    pub content_selector: Option<String>,
    pub image: Option<ImageSlot>,
    pub author_name_selector: Option<String>,
    pub author_images: Vec<ImageSlot>,
    pub date_selector: Option<String>,
    pub tag_selector: Option<String>,
    /// Name of the CSS custom property holding the template's accent color.
    pub primary_color_variable: Option<String>,
    pub name_selector: Option<String>,
    pub short_name_selector: Option<String>,
    pub news_from_selector: Option<String>,
    /// Clicked once after the template loads (cookie banners, notices).
    pub elements_to_click: Vec<String>,
    pub elements_to_hide: Vec<String>,
    pub elements_to_delete: Vec<String>,
    pub class_names_to_rewrite: Vec<ClassNameRewrite>,
    pub selector_styles: Vec<SelectorStyle>,
    pub colors_to_overwrite: Vec<String>,
    pub background_colors_to_overwrite: Vec<String>,
}

/// A fake reporter used for rendered bylines.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
