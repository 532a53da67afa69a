//! Compilation of a template and an article into mutation operations.
//!
//! Every configured template slot produces exactly one operation (one per
//! entry for list slots). Unset or blank selectors produce nothing, so the
//! executor never sees placeholder work.

use super::{FillMode, MutationOperation, SiteName};
use crate::models::{Article, Author, ElementKind, ImageSlot, Source, Template};
use crate::utils::random_recent_date;
use rand::rng;
use rand::seq::IndexedRandom;

/// Byline details and navigation labels that are not part of the article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDressing {
    pub author: Option<Author>,
    pub date: String,
    pub tags: Vec<String>,
}

impl PageDressing {
    /// Pick a random author and a random date within the last three months.
    pub fn random(authors: &[Author], tags: &[String]) -> Self {
        Self {
            author: authors.choose(&mut rng()).cloned(),
            date: random_recent_date(),
            tags: tags.to_vec(),
        }
    }
}

fn configured(selector: &Option<String>) -> Option<&str> {
    selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn listed(selectors: &[String]) -> impl Iterator<Item = &str> {
    selectors.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn fill_mode(kind: ElementKind) -> FillMode {
    match kind {
        ElementKind::Img => FillMode::DirectAttribute,
        ElementKind::Background => FillMode::BackgroundFill,
    }
}

fn swap_image(slot: &ImageSlot, src: &str) -> Option<MutationOperation> {
    let selector = slot.selector.trim();
    (!selector.is_empty()).then(|| MutationOperation::SwapImage {
        selector: selector.to_string(),
        src: src.to_string(),
        fill: fill_mode(slot.kind),
    })
}

/// Convert a style key to a CSS property name: `maxWidth` -> `max-width`.
/// Custom properties and already hyphenated names pass through.
pub fn css_property_name(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// Compile the operations that render `article` into `template`.
pub fn compile(
    template: &Template,
    article: &Article,
    source: &Source,
    dressing: &PageDressing,
) -> Vec<MutationOperation> {
    let mut ops = Vec::new();

    if let Some(selector) = configured(&template.title_selector) {
        ops.push(MutationOperation::SetText {
            selector: selector.to_string(),
            text: article.title.clone(),
        });
    }
    if let Some(selector) = configured(&template.content_selector) {
        ops.push(MutationOperation::SetText {
            selector: selector.to_string(),
            text: article.content.clone(),
        });
    }
    if let Some(slot) = &template.image {
        ops.extend(swap_image(slot, &article.image));
    }

    if let (Some(selector), Some(author)) =
        (configured(&template.author_name_selector), &dressing.author)
    {
        ops.push(MutationOperation::SetTextAll {
            selector: selector.to_string(),
            text: author.name.clone(),
        });
    }
    if let Some(image) = dressing.author.as_ref().and_then(|a| a.image.as_deref()) {
        ops.extend(
            template
                .author_images
                .iter()
                .filter_map(|slot| swap_image(slot, image)),
        );
    }
    if let Some(selector) = configured(&template.date_selector) {
        ops.push(MutationOperation::SetTextAll {
            selector: selector.to_string(),
            text: dressing.date.clone(),
        });
    }
    if let Some(selector) = configured(&template.tag_selector) {
        ops.push(MutationOperation::ReplaceTagList {
            selector: selector.to_string(),
            tags: dressing.tags.clone(),
        });
    }

    if let Some(color) = configured(&source.primary_brand_color) {
        if let Some(name) = configured(&template.primary_color_variable) {
            ops.push(MutationOperation::SetCssVariable {
                name: name.to_string(),
                value: color.to_string(),
            });
        }
        ops.extend(listed(&template.background_colors_to_overwrite).map(|selector| {
            MutationOperation::OverwriteBackgroundColor {
                selector: selector.to_string(),
                color: color.to_string(),
            }
        }));
        ops.extend(
            listed(&template.colors_to_overwrite).map(|selector| MutationOperation::OverwriteColor {
                selector: selector.to_string(),
                color: color.to_string(),
            }),
        );
    }

    let names = [
        (
            &template.name_selector,
            Some(source.website_name.trim())
                .filter(|n| !n.is_empty())
                .map(|n| SiteName::Full(n.to_string())),
        ),
        (
            &template.short_name_selector,
            configured(&source.website_short_name).map(|n| SiteName::Short(n.to_string())),
        ),
        (
            &template.news_from_selector,
            configured(&source.news_from).map(|n| SiteName::NewsFrom(n.to_string())),
        ),
    ];
    for (selector, name) in names {
        if let (Some(selector), Some(name)) = (configured(selector), name) {
            ops.push(MutationOperation::ReplaceName {
                selector: selector.to_string(),
                name,
            });
        }
    }

    ops.extend(listed(&template.elements_to_hide).map(|selector| MutationOperation::Hide {
        selector: selector.to_string(),
    }));
    ops.extend(listed(&template.elements_to_delete).map(|selector| MutationOperation::Delete {
        selector: selector.to_string(),
    }));
    ops.extend(
        template
            .class_names_to_rewrite
            .iter()
            .filter(|rule| !rule.selector.trim().is_empty())
            .map(|rule| MutationOperation::RewriteClassName {
                selector: rule.selector.trim().to_string(),
                class_name: rule.class_name.clone(),
            }),
    );
    ops.extend(
        template
            .selector_styles
            .iter()
            .filter(|rule| !rule.selector.trim().is_empty() && !rule.styles.is_empty())
            .map(|rule| MutationOperation::ApplyStyles {
                selector: rule.selector.trim().to_string(),
                styles: rule
                    .styles
                    .iter()
                    .map(|(key, value)| (css_property_name(key), value.clone()))
                    .collect(),
            }),
    );

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassNameRewrite, SelectorStyle, SourceSelectors};
    use crate::mutations::MutationKind;
    use indexmap::IndexMap;

    fn article() -> Article {
        Article {
            href: "https://news.example.com/a".to_string(),
            title: "Bridge reopens".to_string(),
            content: "The bridge reopened.".to_string(),
            image: "https://news.example.com/a.jpg".to_string(),
            perspective: Some("neutral".to_string()),
            national_news: false,
        }
    }

    fn source() -> Source {
        Source {
            base_url: "https://news.example.com/".to_string(),
            website_name: "Heart of Maine News".to_string(),
            website_short_name: Some("WHME".to_string()),
            news_from: Some("Bangor Maine".to_string()),
            state: None,
            district: None,
            national_news_source: false,
            template: "tagdiv".to_string(),
            perspective: "neutral".to_string(),
            selectors: SourceSelectors {
                anchor: "a".to_string(),
                pagination: None,
                title: "h1".to_string(),
                image: "img".to_string(),
                content: "div".to_string(),
                only_read_top_level_tag: None,
            },
            primary_brand_color: Some("#0C257A".to_string()),
            max_number_of_articles: None,
            articles: Vec::new(),
        }
    }

    fn dressing() -> PageDressing {
        PageDressing {
            author: Some(Author {
                name: "Jane Doe".to_string(),
                image: Some("https://cdn.example.com/jane.jpg".to_string()),
            }),
            date: "October 19th, 2026".to_string(),
            tags: vec!["HOME".to_string(), "SPORTS".to_string()],
        }
    }

    fn full_template() -> Template {
        Template {
            base_url: "https://demo.example.com/post/".to_string(),
            title_selector: Some("h1.tdb-title-text".to_string()),
            content_selector: Some("div.tdb_single_content".to_string()),
            image: Some(ImageSlot {
                selector: "div.tdb-featured-image-bg".to_string(),
                kind: ElementKind::Background,
            }),
            author_name_selector: Some("a.tdb-author-name".to_string()),
            author_images: vec![
                ImageSlot {
                    selector: "img.avatar".to_string(),
                    kind: ElementKind::Img,
                },
                ImageSlot {
                    selector: " ".to_string(),
                    kind: ElementKind::Img,
                },
            ],
            date_selector: Some("time.entry-date".to_string()),
            tag_selector: Some("div.tdb-menu-item-text".to_string()),
            primary_color_variable: Some("--today-news-accent".to_string()),
            name_selector: Some("span.tdb-logo-text-title".to_string()),
            short_name_selector: Some("span.tdb-logo-text-tagline".to_string()),
            news_from_selector: Some("span.news-from".to_string()),
            elements_to_click: vec!["button.close".to_string()],
            elements_to_hide: vec!["div.author-box".to_string(), "#tdi_52".to_string()],
            elements_to_delete: vec!["#tdi_25".to_string()],
            class_names_to_rewrite: vec![ClassNameRewrite {
                selector: "div.td-pb-span8".to_string(),
                class_name: "vc_column td-pb-span12".to_string(),
            }],
            selector_styles: vec![SelectorStyle {
                selector: "div.td-container".to_string(),
                styles: IndexMap::from([
                    ("maxWidth".to_string(), "1300px".to_string()),
                    ("font-size".to_string(), "18px".to_string()),
                ]),
            }],
            colors_to_overwrite: vec!["a.tdb-author-name".to_string()],
            background_colors_to_overwrite: vec!["div.tdi_39_rand_style".to_string()],
        }
    }

    #[test]
    fn test_title_and_content_only_compile_to_two_operations() {
        let template = Template {
            base_url: "https://demo.example.com/".to_string(),
            title_selector: Some("h1".to_string()),
            content_selector: Some("div.body".to_string()),
            ..Template::default()
        };
        let ops = compile(&template, &article(), &source(), &dressing());
        assert_eq!(
            ops,
            vec![
                MutationOperation::SetText {
                    selector: "h1".to_string(),
                    text: "Bridge reopens".to_string(),
                },
                MutationOperation::SetText {
                    selector: "div.body".to_string(),
                    text: "The bridge reopened.".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_blank_selectors_emit_nothing() {
        let template = Template {
            title_selector: Some("  ".to_string()),
            date_selector: Some(String::new()),
            elements_to_hide: vec![String::new()],
            ..Template::default()
        };
        assert!(compile(&template, &article(), &source(), &dressing()).is_empty());
    }

    #[test]
    fn test_full_template_emits_one_operation_per_slot() {
        let ops = compile(&full_template(), &article(), &source(), &dressing());
        let count = |kind: MutationKind| ops.iter().filter(|op| op.kind() == kind).count();

        assert_eq!(count(MutationKind::SetText), 2);
        assert_eq!(count(MutationKind::SetTextAll), 2);
        assert_eq!(count(MutationKind::SwapImage), 2);
        assert_eq!(count(MutationKind::SetCssVariable), 1);
        assert_eq!(count(MutationKind::Hide), 2);
        assert_eq!(count(MutationKind::Delete), 1);
        assert_eq!(count(MutationKind::ReplaceTagList), 1);
        assert_eq!(count(MutationKind::RewriteClassName), 1);
        assert_eq!(count(MutationKind::ApplyStyles), 1);
        assert_eq!(count(MutationKind::OverwriteBackgroundColor), 1);
        assert_eq!(count(MutationKind::OverwriteColor), 1);
        assert_eq!(count(MutationKind::ReplaceName), 3);
        assert_eq!(ops.len(), 18);
    }

    #[test]
    fn test_fill_mode_follows_declared_kind() {
        let ops = compile(&full_template(), &article(), &source(), &dressing());
        let fills: Vec<(&str, FillMode)> = ops
            .iter()
            .filter_map(|op| match op {
                MutationOperation::SwapImage { selector, fill, .. } => Some((selector.as_str(), *fill)),
                _ => None,
            })
            .collect();
        assert_eq!(
            fills,
            vec![
                ("div.tdb-featured-image-bg", FillMode::BackgroundFill),
                ("img.avatar", FillMode::DirectAttribute),
            ]
        );
    }

    #[test]
    fn test_name_variants_carry_literal_text() {
        let ops = compile(&full_template(), &article(), &source(), &dressing());
        let names: Vec<String> = ops
            .iter()
            .filter_map(|op| match op {
                MutationOperation::ReplaceName { name, .. } => Some(name.text()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            vec!["Heart of Maine News", "WHME", "News from Bangor Maine"]
        );
    }

    #[test]
    fn test_brand_color_ops_need_a_brand_color() {
        let mut source = source();
        source.primary_brand_color = None;
        let ops = compile(&full_template(), &article(), &source, &dressing());
        assert!(ops.iter().all(|op| !matches!(
            op.kind(),
            MutationKind::SetCssVariable
                | MutationKind::OverwriteColor
                | MutationKind::OverwriteBackgroundColor
        )));
    }

    #[test]
    fn test_author_without_image_skips_avatar_swaps() {
        let mut dressing = dressing();
        dressing.author = Some(Author {
            name: "John Roe".to_string(),
            image: None,
        });
        let ops = compile(&full_template(), &article(), &source(), &dressing);
        let swaps = ops.iter().filter(|op| op.kind() == MutationKind::SwapImage).count();
        assert_eq!(swaps, 1);
    }

    #[test]
    fn test_styles_are_normalized() {
        let ops = compile(&full_template(), &article(), &source(), &dressing());
        let styles = ops
            .iter()
            .find_map(|op| match op {
                MutationOperation::ApplyStyles { styles, .. } => Some(styles.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            styles,
            vec![
                ("max-width".to_string(), "1300px".to_string()),
                ("font-size".to_string(), "18px".to_string()),
            ]
        );
    }

    #[test]
    fn test_shorthand_after_longhand_stays_last() {
        let template = Template {
            base_url: "https://demo.example.com/".to_string(),
            selector_styles: vec![SelectorStyle {
                selector: "div.hero".to_string(),
                styles: IndexMap::from([
                    ("backgroundColor".to_string(), "#fff".to_string()),
                    ("background".to_string(), "none".to_string()),
                ]),
            }],
            ..Template::default()
        };
        let ops = compile(&template, &article(), &source(), &dressing());
        assert!(ops.contains(&MutationOperation::ApplyStyles {
            selector: "div.hero".to_string(),
            styles: vec![
                ("background-color".to_string(), "#fff".to_string()),
                ("background".to_string(), "none".to_string()),
            ],
        }));
    }

    #[test]
    fn test_css_property_name() {
        assert_eq!(css_property_name("maxWidth"), "max-width");
        assert_eq!(css_property_name("backgroundColor"), "background-color");
        assert_eq!(css_property_name("--today-news-accent"), "--today-news-accent");
        assert_eq!(css_property_name("width"), "width");
    }

    #[test]
    fn test_random_dressing_uses_given_authors_and_tags() {
        let authors = vec![Author {
            name: "Jane Doe".to_string(),
            image: None,
        }];
        let tags = vec!["HOME".to_string()];
        let dressing = PageDressing::random(&authors, &tags);
        assert_eq!(dressing.author.unwrap().name, "Jane Doe");
        assert_eq!(dressing.tags, tags);
        assert!(!dressing.date.is_empty());

        assert!(PageDressing::random(&[], &tags).author.is_none());
    }
}
