//! Command-line interface definitions for Perspective Press.
//!
//! All arguments can be provided via command-line flags; the sites file can
//! also come from the environment.

use clap::Parser;

/// Command-line arguments for the Perspective Press application.
///
/// # Examples
///
/// ```sh
/// # Full run: scrape, rewrite, render
/// perspective_press -c sites.yaml
///
/// # Re-render the last rewrite without scraping or calling the model
/// perspective_press -c sites.yaml --use-persisted --headful
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Sites file: settings, templates, perspectives and sources
    #[arg(short, long, env = "PERSPECTIVE_PRESS_CONFIG")]
    pub config: String,

    /// Root directory for per-run screenshot folders
    #[arg(short, long, default_value = "./screenshots")]
    pub output_dir: String,

    /// Directory for the pre- and post-rewrite article snapshots
    #[arg(short, long, default_value = "./data")]
    pub data_dir: String,

    /// Skip scraping and rewriting; render the persisted post-rewrite snapshot
    #[arg(long)]
    pub use_persisted: bool,

    /// awful_aj chat template used for rewriting
    #[arg(long, default_value = "news_rewriter")]
    pub template: String,

    /// Optional path to the awful_aj config.yaml (defaults to its config dir)
    #[arg(long)]
    pub aj_config: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Only process the first N sources
    #[arg(long)]
    pub limit_sources: Option<usize>,
}
