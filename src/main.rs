//! # Perspective Press
//!
//! Scrapes news articles from configured sources, rewrites each one under a
//! configured perspective through an OpenAI-compatible LLM, renders the
//! rewritten articles into a cloned news-site template in a real browser,
//! and captures a screenshot of every result.
//!
//! ## Usage
//!
//! ```sh
//! perspective_press -c sites.yaml -o ./screenshots -d ./data
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Scrape**: collect article links from each listing page, then fetch
//!    title, lead image and body of every link
//! 2. **Rewrite**: send each article to the LLM with its source's
//!    perspective prompt (4 requests in flight per source)
//! 3. **Render**: load the source's template page, compile the article into
//!    DOM mutations, apply them all at once, screenshot
//!
//! Snapshots are written after scrape and rewrite; `--use-persisted` starts
//! directly at render from the last post-rewrite snapshot.

use awful_aj::config::{self as aj_config, AwfulJadeConfig};
use awful_aj::template::{self, ChatTemplate};
use awful_aj::config_dir;
use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod browser;
mod cli;
mod config;
mod models;
mod mutations;
mod outputs;
mod pipeline;
mod rewrite;
mod scrapers;
mod utils;

use api::rewrite_client;
use browser::chromium::ChromiumBrowser;
use cli::Cli;
use config::SiteConfig;
use outputs::json::{ALTERED_SNAPSHOT, ORIGINAL_SNAPSHOT, read_snapshot, write_snapshot};
use pipeline::{PipelineState, RenderSummary};
use utils::{ensure_writable_dir, run_timestamp};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("perspective_press starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut site = SiteConfig::load(&args.config).await?;
    if args.headful {
        site.settings.headless = false;
    }
    if let Some(limit) = args.limit_sources {
        site.sources.truncate(limit);
        info!(limit, "Limiting sources");
    }

    // Early check: both output locations must be writable
    for dir in [&args.output_dir, &args.data_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    let browser = ChromiumBrowser::launch(&site.settings).await?;
    let result = run(&args, &site, &browser).await;
    browser.shutdown().await;

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        ),
        Err(e) => error!(?elapsed, error = %e, "Execution failed"),
    }
    result
}

/// Load the awful_aj config and chat template used for rewriting.
#[instrument(level = "info", skip_all, fields(template = %args.template))]
async fn load_rewriter(args: &Cli) -> Result<(AwfulJadeConfig, ChatTemplate), Box<dyn Error>> {
    let template = template::load_template(&args.template).await?;
    info!(template = %args.template, "Loaded template");

    let config_path = match &args.aj_config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml").to_string_lossy().into_owned(),
    };
    let config = aj_config::load_config(&config_path)?;
    info!(%config_path, "Loaded configuration");
    Ok((config, template))
}

/// Drive every source through scrape, rewrite and render before starting
/// the next one. Snapshots are rewritten after each source so they always
/// hold every source finished so far.
async fn run(args: &Cli, site: &SiteConfig, browser: &ChromiumBrowser) -> Result<(), Box<dyn Error>> {
    let page = browser.new_page(&site.settings).await?;
    let run_dir = Path::new(&args.output_dir).join(run_timestamp(&Local::now()));
    let mut summary = RenderSummary::default();

    if args.use_persisted {
        let mut sources = read_snapshot(&args.data_dir, ALTERED_SNAPSHOT).await?;
        if let Some(limit) = args.limit_sources {
            sources.truncate(limit);
        }
        for source in sources {
            summary += pipeline::render(&PipelineState::new(vec![source]), &page, site, &run_dir).await?;
        }
    } else {
        let (llm_config, llm_template) = load_rewriter(args).await?;
        let asker = rewrite_client(&llm_config, &llm_template);

        let mut originals = Vec::with_capacity(site.sources.len());
        let mut altered = Vec::with_capacity(site.sources.len());
        for source in &site.sources {
            info!(source = %source.website_name, "Processing source");
            let scraped = pipeline::scrape(PipelineState::new(vec![source.clone()]), &page, &site.settings).await;
            originals.extend_from_slice(scraped.sources());
            write_snapshot(&originals, &args.data_dir, ORIGINAL_SNAPSHOT).await?;

            let rewritten = pipeline::rewrite(scraped, &asker, site).await;
            altered.extend_from_slice(rewritten.sources());
            write_snapshot(&altered, &args.data_dir, ALTERED_SNAPSHOT).await?;

            summary += pipeline::render(&rewritten, &page, site, &run_dir).await?;
        }
    }

    info!(
        rendered = summary.rendered,
        degraded = summary.degraded,
        skipped_sources = summary.skipped_sources,
        run_dir = %run_dir.display(),
        "Rendered articles"
    );
    Ok(())
}
