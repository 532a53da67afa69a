//! JSON snapshots of the article set.
//!
//! The scrape stage writes `articles_original.json` and the rewrite stage
//! writes `articles_altered.json` into the data directory. Both hold the
//! full source list, pretty printed, with each source's articles nested
//! inside it. `--use-persisted` reads the post-rewrite snapshot back instead
//! of scraping again.
//!
//! ```text
//! data_dir/
//! ├── articles_original.json
//! └── articles_altered.json
//! ```

use crate::models::Source;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const ORIGINAL_SNAPSHOT: &str = "articles_original.json";
pub const ALTERED_SNAPSHOT: &str = "articles_altered.json";

/// Serialize `sources` to `{data_dir}/{name}`, creating the directory first.
#[instrument(level = "info", skip(sources), fields(sources = sources.len()))]
pub async fn write_snapshot(
    sources: &[Source],
    data_dir: &str,
    name: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(sources)?;

    if let Err(e) = fs::create_dir_all(data_dir).await {
        error!(%data_dir, error = %e, "Failed to create data dir");
        return Err(e.into());
    }

    let path = Path::new(data_dir).join(name);
    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        articles = sources.iter().map(|s| s.articles.len()).sum::<usize>(),
        "Wrote snapshot"
    );
    Ok(path)
}

/// Load a snapshot previously written by [`write_snapshot`].
#[instrument(level = "info")]
pub async fn read_snapshot(data_dir: &str, name: &str) -> Result<Vec<Source>, Box<dyn Error>> {
    let path = Path::new(data_dir).join(name);
    let raw = fs::read_to_string(&path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to read snapshot");
        e
    })?;
    let sources: Vec<Source> = serde_json::from_str(&raw)?;
    info!(path = %path.display(), sources = sources.len(), "Loaded snapshot");
    Ok(sources)
}
