//! Perspective rewriting of scraped articles.
//!
//! Every article is sent to the rewrite service as
//! `"{perspective prompt}. {raw text}"`. The first line of the completion
//! becomes the headline and the remaining lines the body.

use crate::api::AskAsync;
use crate::config::Settings;
use crate::models::{Article, Source};
use crate::utils::{clean_headline, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewrite service failed: {0}")]
    Service(String),
    #[error("completion has no headline")]
    EmptyHeadline,
    #[error("completion has no body")]
    EmptyBody,
}

/// One article's worth of input to the rewrite service.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    pub perspective: &'a str,
    pub raw_text: &'a str,
}

impl RewriteRequest<'_> {
    pub fn prompt(&self) -> String {
        format!("{}. {}", self.perspective, self.raw_text)
    }
}

/// Headline and body parsed out of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenText {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub headline_max_characters: usize,
    pub content_max_paragraphs: usize,
    /// Articles past this count are kept as scraped without a request.
    pub max_per_source: Option<usize>,
    /// Requests in flight per source.
    pub concurrency: usize,
}

impl From<&Settings> for RewriteOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            headline_max_characters: settings.headline_max_characters,
            content_max_paragraphs: settings.content_max_paragraphs,
            max_per_source: settings.max_rewrites_per_source,
            concurrency: settings.rewrite_concurrency,
        }
    }
}

/// Cut `headline` to at most `max` characters, preferring the last word
/// boundary inside the limit.
pub fn cap_headline(headline: &str, max: usize) -> String {
    if headline.chars().count() <= max {
        return headline.to_string();
    }
    let cut = headline
        .char_indices()
        .nth(max)
        .map_or(headline.len(), |(i, _)| i);
    let head = &headline[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    head.trim_end().to_string()
}

/// Split a completion into headline and body, applying the length caps.
pub fn parse_response(raw: &str, options: &RewriteOptions) -> Result<RewrittenText, RewriteError> {
    let raw = raw.trim();
    let (first, rest) = raw.split_once('\n').unwrap_or((raw, ""));

    let title = cap_headline(&clean_headline(first), options.headline_max_characters);
    if title.is_empty() {
        return Err(RewriteError::EmptyHeadline);
    }

    let content = rest
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(options.content_max_paragraphs)
        .collect::<Vec<_>>()
        .join("\n");
    if content.is_empty() {
        return Err(RewriteError::EmptyBody);
    }

    Ok(RewrittenText { title, content })
}

/// Rewrite one article. The returned article carries `perspective_key`.
pub async fn rewrite_article<A>(
    asker: &A,
    article: &Article,
    prompt: &str,
    perspective_key: &str,
    options: &RewriteOptions,
) -> Result<Article, RewriteError>
where
    A: AskAsync<Response = String>,
{
    let request = RewriteRequest {
        perspective: prompt,
        raw_text: &article.content,
    };
    let t0 = Instant::now();
    let response = asker
        .ask(&request.prompt())
        .await
        .map_err(|e| RewriteError::Service(e.to_string()))?;
    debug!(
        href = %article.href,
        elapsed_ms = t0.elapsed().as_millis(),
        preview = %truncate_for_log(&response, 120),
        "Received completion"
    );

    let text = parse_response(&response, options)?;
    Ok(Article {
        title: text.title,
        content: text.content,
        perspective: Some(perspective_key.to_string()),
        ..article.clone()
    })
}

/// Rewrite a source's articles in place.
///
/// Articles past `options.max_per_source` and articles whose rewrite fails are
/// kept unchanged with no perspective, so rendering skips them while the
/// post-rewrite snapshot still lists them. Completions are collected in article
/// order even though up to `options.concurrency` requests run at once.
#[instrument(level = "info", skip_all, fields(source = %source.website_name))]
pub async fn rewrite_source<A>(
    asker: &A,
    mut source: Source,
    prompt: &str,
    options: &RewriteOptions,
) -> Source
where
    A: AskAsync<Response = String>,
{
    let articles = std::mem::take(&mut source.articles);
    let total = articles.len();
    let limit = options.max_per_source.unwrap_or(usize::MAX);
    let perspective_key = source.perspective.clone();

    let articles: Vec<Article> = stream::iter(articles.into_iter().enumerate())
        .map(|(index, article)| {
            let perspective_key = perspective_key.as_str();
            async move {
                if index >= limit {
                    return article;
                }
                match rewrite_article(asker, &article, prompt, perspective_key, options).await {
                    Ok(rewritten) => rewritten,
                    Err(e) => {
                        warn!(href = %article.href, error = %e, "Rewrite failed; keeping original");
                        article
                    }
                }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let rewritten = articles.iter().filter(|a| a.is_rewritten()).count();
    info!(
        total,
        attempted = total.min(limit),
        rewritten,
        "Rewrote articles"
    );
    source.articles = articles;
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceSelectors;
    use std::error::Error;
    use std::sync::Mutex;

    fn options() -> RewriteOptions {
        RewriteOptions::from(&Settings::default())
    }

    /// Answers every prompt with a canned completion; prompts are recorded.
    #[derive(Debug, Default)]
    struct ScriptedAsk {
        prompts: Mutex<Vec<String>>,
    }

    impl AskAsync for ScriptedAsk {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.lock().unwrap().push(text.to_string());
            if text.contains("FAIL") {
                return Err("model overloaded".into());
            }
            if text.contains("BLANK") {
                return Ok("\"Headline only\"".to_string());
            }
            let n = self.prompts.lock().unwrap().len();
            Ok(format!("\"**Rewritten {n}**\"\nFirst paragraph.\n\nSecond paragraph."))
        }
    }

    fn article(href: &str, content: &str) -> Article {
        Article {
            href: href.to_string(),
            title: "Original".to_string(),
            content: content.to_string(),
            image: "https://cdn.example.com/a.jpg".to_string(),
            perspective: None,
            national_news: false,
        }
    }

    fn source(articles: Vec<Article>) -> Source {
        Source {
            base_url: "https://news.example.com".to_string(),
            website_name: "Example News".to_string(),
            website_short_name: None,
            news_from: None,
            state: None,
            district: None,
            national_news_source: false,
            template: "daily".to_string(),
            perspective: "skeptic".to_string(),
            selectors: SourceSelectors::default(),
            primary_brand_color: None,
            max_number_of_articles: Some(10),
            articles,
        }
    }

    #[test]
    fn test_prompt_joins_perspective_and_text() {
        let request = RewriteRequest {
            perspective: "Rewrite this as a skeptic",
            raw_text: "The council met on Tuesday.",
        };
        assert_eq!(
            request.prompt(),
            "Rewrite this as a skeptic. The council met on Tuesday."
        );
    }

    #[test]
    fn test_parse_response_splits_headline_and_body() {
        let text = parse_response(
            "\"**Council Votes Again**\"\nParagraph one.\n\n  Paragraph two.  \n",
            &options(),
        )
        .unwrap();
        assert_eq!(text.title, "Council Votes Again");
        assert_eq!(text.content, "Paragraph one.\nParagraph two.");
    }

    #[test]
    fn test_parse_response_caps_paragraphs() {
        let body: String = (1..=20).map(|i| format!("\nP{i}")).collect();
        let text = parse_response(&format!("Title{body}"), &options()).unwrap();
        assert_eq!(text.content.lines().count(), 12);
        assert!(text.content.ends_with("P12"));
    }

    #[test]
    fn test_parse_response_rejects_empty_parts() {
        assert!(matches!(
            parse_response("\"\"\nbody", &options()),
            Err(RewriteError::EmptyHeadline)
        ));
        assert!(matches!(
            parse_response("Just a headline", &options()),
            Err(RewriteError::EmptyBody)
        ));
    }

    #[test]
    fn test_cap_headline_breaks_on_word_boundary() {
        assert_eq!(cap_headline("Short one", 75), "Short one");
        assert_eq!(cap_headline("Mayor announces new park plan", 20), "Mayor announces new");
        assert_eq!(cap_headline("Supercalifragilistic", 5), "Super");
        let long = "word ".repeat(40);
        assert!(cap_headline(&long, 75).chars().count() <= 75);
    }

    #[tokio::test]
    async fn test_rewrite_source_keeps_failures_unrewritten_in_order() {
        let asker = ScriptedAsk::default();
        let src = source(vec![
            article("https://news.example.com/1", "one"),
            article("https://news.example.com/2", "FAIL"),
            article("https://news.example.com/3", "BLANK"),
            article("https://news.example.com/4", "four"),
        ]);

        let out = rewrite_source(&asker, src, "Be skeptical", &options()).await;

        let hrefs: Vec<_> = out.articles.iter().map(|a| a.href.as_str()).collect();
        assert_eq!(
            hrefs,
            [
                "https://news.example.com/1",
                "https://news.example.com/2",
                "https://news.example.com/3",
                "https://news.example.com/4",
            ]
        );
        let rewritten: Vec<bool> = out.articles.iter().map(|a| a.is_rewritten()).collect();
        assert_eq!(rewritten, [true, false, false, true]);
        assert_eq!(out.articles[0].perspective.as_deref(), Some("skeptic"));
        assert!(out.articles[0].title.starts_with("Rewritten"));
        assert_eq!(out.articles[0].image, "https://cdn.example.com/a.jpg");
        assert_eq!(out.articles[1].content, "FAIL");
        assert_eq!(out.articles[2].content, "BLANK");
        assert!(
            asker
                .prompts
                .lock()
                .unwrap()
                .contains(&"Be skeptical. one".to_string())
        );
    }

    #[tokio::test]
    async fn test_rewrite_source_honors_per_source_limit() {
        let asker = ScriptedAsk::default();
        let src = source(
            (1..=5)
                .map(|i| article(&format!("https://news.example.com/{i}"), "text"))
                .collect(),
        );
        let opts = RewriteOptions {
            max_per_source: Some(2),
            ..options()
        };

        let out = rewrite_source(&asker, src, "Be skeptical", &opts).await;
        assert_eq!(out.articles.len(), 5);
        let rewritten: Vec<bool> = out.articles.iter().map(|a| a.is_rewritten()).collect();
        assert_eq!(rewritten, [true, true, false, false, false]);
        assert_eq!(out.articles[4].content, "text");
        assert_eq!(asker.prompts.lock().unwrap().len(), 2);
    }
}
