//! The three pipeline stages: scrape, rewrite, render.
//!
//! A [`PipelineState`] owns a source list and is handed from stage to stage
//! by value. The binary feeds one source at a time through all three stages
//! so each source is finished before the next one starts. Within a stage
//! sources are handled one at a time on a single page; a source that fails
//! is logged and skipped.

use crate::api::AskAsync;
use crate::browser::{BrowserError, PageContext};
use crate::config::{Settings, SiteConfig};
use crate::models::{Source, Template};
use crate::mutations::compiler::{PageDressing, compile};
use crate::mutations::executor::MutationExecutor;
use crate::outputs::artifacts::SourceArtifacts;
use crate::rewrite::{RewriteOptions, rewrite_source};
use crate::scrapers::collector::{CollectorOptions, index_articles};
use crate::scrapers::extractor::{ExtractionStats, ExtractorOptions, fetch_articles};
use std::error::Error;
use std::ops::AddAssign;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

/// The article set flowing through the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    sources: Vec<Source>,
}

impl PipelineState {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<Source> {
        self.sources
    }

    pub fn article_count(&self) -> usize {
        self.sources.iter().map(|s| s.articles.len()).sum()
    }
}

/// Collect links and fetch articles for every source.
///
/// Sources whose listing page cannot be loaded come out with no articles.
#[instrument(level = "info", skip_all, fields(sources = state.sources.len()))]
pub async fn scrape<P: PageContext>(
    state: PipelineState,
    page: &P,
    settings: &Settings,
) -> PipelineState {
    let collector = CollectorOptions::from(settings);
    let extractor = ExtractorOptions::from(settings);
    let mut stats = ExtractionStats::default();

    let mut sources = state.into_sources();
    for source in &mut sources {
        let collection = match index_articles(page, source, &collector).await {
            Ok(collection) => collection,
            Err(e) => {
                error!(source = %source.website_name, error = %e, "Failed to index articles; skipping source");
                source.articles.clear();
                continue;
            }
        };
        info!(
            source = %source.website_name,
            links = collection.links.len(),
            scans = collection.scans,
            outcome = ?collection.outcome,
            "Indexed articles"
        );
        source.articles = fetch_articles(page, source, &collection.links, &extractor, &mut stats).await;
    }

    info!(
        accepted = stats.accepted(),
        discarded = stats.discarded(),
        national = stats.national,
        local = stats.local,
        missing_image = stats.missing_image,
        missing_title = stats.missing_title,
        missing_content = stats.missing_content,
        failed = stats.failed,
        "Finished scraping"
    );
    PipelineState::new(sources)
}

/// Rewrite every source's articles under its perspective. Articles that
/// are not rewritten stay in the state without a perspective.
#[instrument(level = "info", skip_all, fields(articles = state.article_count()))]
pub async fn rewrite<A>(state: PipelineState, asker: &A, config: &SiteConfig) -> PipelineState
where
    A: AskAsync<Response = String>,
{
    let options = RewriteOptions::from(&config.settings);
    let mut rewritten = Vec::with_capacity(state.sources.len());

    for source in state.into_sources() {
        match config.perspective_prompt(&source) {
            Some(prompt) => {
                let prompt = prompt.to_string();
                rewritten.push(rewrite_source(asker, source, &prompt, &options).await);
            }
            None => {
                warn!(
                    source = %source.website_name,
                    perspective = %source.perspective,
                    "Unknown perspective; leaving articles unrewritten"
                );
                rewritten.push(source);
            }
        }
    }

    let state = PipelineState::new(rewritten);
    let rewritten = state
        .sources
        .iter()
        .flat_map(|s| &s.articles)
        .filter(|a| a.is_rewritten())
        .count();
    info!(articles = state.article_count(), rewritten, "Finished rewriting");
    state
}

/// Counters reported by [`render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    /// Rendered articles whose mutation batch had at least one failure.
    pub degraded: usize,
    pub skipped_sources: usize,
}

impl AddAssign for RenderSummary {
    fn add_assign(&mut self, other: Self) {
        self.rendered += other.rendered;
        self.degraded += other.degraded;
        self.skipped_sources += other.skipped_sources;
    }
}

/// Load a template page and click away overlays before any article is
/// rendered into it.
#[instrument(level = "info", skip_all, fields(template = %template.base_url))]
pub async fn prepare_template<P: PageContext>(
    page: &P,
    template: &Template,
    settings: &Settings,
) -> Result<(), BrowserError> {
    page.navigate(&template.base_url).await?;

    if let Some(slot) = &template.image {
        if !page
            .wait_for_selector(&slot.selector, settings.template_wait())
            .await
            .is_ready()
        {
            warn!(selector = %slot.selector, "Template image did not become visible");
        }
    }

    for selector in &template.elements_to_click {
        if !page
            .wait_for_selector(selector, settings.click_wait())
            .await
            .is_ready()
        {
            debug!(%selector, "Click target not visible; trying anyway");
        }
        match page.click(selector).await {
            Ok(true) => debug!(%selector, "Clicked"),
            Ok(false) => warn!(%selector, "Could not click; element not found"),
            Err(e) => warn!(%selector, error = %e, "Could not click"),
        }
    }
    Ok(())
}

/// Render every rewritten article into its source's template and capture it.
///
/// # Errors
///
/// Returns an error only if an artifact cannot be written; browser failures
/// skip the affected source.
#[instrument(level = "info", skip_all, fields(run_dir = %run_dir.display()))]
pub async fn render<P: PageContext>(
    state: &PipelineState,
    page: &P,
    config: &SiteConfig,
    run_dir: &Path,
) -> Result<RenderSummary, Box<dyn Error>> {
    let settings = &config.settings;
    let executor = MutationExecutor::from(settings);
    let mut summary = RenderSummary::default();

    for source in state.sources() {
        let articles: Vec<_> = source.articles.iter().filter(|a| a.is_rewritten()).collect();
        if articles.is_empty() {
            debug!(source = %source.website_name, "Nothing to render");
            continue;
        }
        let Some(template) = config.template_for(source) else {
            warn!(source = %source.website_name, template = %source.template, "Unknown template; skipping source");
            summary.skipped_sources += 1;
            continue;
        };
        if let Err(e) = prepare_template(page, template, settings).await {
            error!(source = %source.website_name, error = %e, "Failed to load template; skipping source");
            summary.skipped_sources += 1;
            continue;
        }

        let mut artifacts = SourceArtifacts::create(
            run_dir,
            &source.website_name,
            settings.artifact_naming,
            settings.save_raw_html,
        )
        .await?;
        info!(dir = %artifacts.dir().display(), articles = articles.len(), "Rendering source");

        for article in articles {
            let dressing = PageDressing::random(&config.authors, &config.tags);
            let operations = compile(template, article, source, &dressing);
            let report = executor.apply(&operations, page).await;
            debug!(href = %article.href, changed = report.changed, "Mutated template");
            if !report.succeeded {
                for failure in &report.errors {
                    debug!(
                        index = failure.index,
                        kind = %failure.kind,
                        selector = %failure.selector,
                        error = %failure.error,
                        "Failed mutation"
                    );
                }
                warn!(
                    href = %article.href,
                    failed = report.errors.len(),
                    "Some mutations failed; capturing anyway"
                );
                summary.degraded += 1;
            }

            let stem = artifacts.reserve_stem(article);
            let png = match page.screenshot().await {
                Ok(png) => png,
                Err(e) => {
                    error!(href = %article.href, error = %e, "Screenshot failed");
                    continue;
                }
            };
            artifacts.write_screenshot(&stem, &png).await?;

            if settings.save_raw_html {
                match page.content().await {
                    Ok(html) => {
                        artifacts.write_html(&stem, &html).await?;
                    }
                    Err(e) => warn!(href = %article.href, error = %e, "Could not read rendered HTML"),
                }
            }
            summary.rendered += 1;
        }
    }

    info!(
        rendered = summary.rendered,
        degraded = summary.degraded,
        skipped_sources = summary.skipped_sources,
        "Finished rendering"
    );
    Ok(summary)
}
