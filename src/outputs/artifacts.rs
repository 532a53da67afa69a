//! Screenshot and HTML artifacts of rendered articles.
//!
//! ```text
//! output_dir/
//! └── 2026-10-19_08-05-09/          # one directory per run
//!     └── Example News/             # one per source
//!         ├── council_votes_again.png
//!         └── html/
//!             └── council_votes_again.html
//! ```

use crate::config::ArtifactNaming;
use crate::models::Article;
use crate::utils::{short_id, snake_case};
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Length of the random part of [`ArtifactNaming::RandomId`] stems.
const RANDOM_ID_LEN: usize = 8;

/// File stem for an article, before collision handling.
pub fn artifact_stem(article: &Article, naming: ArtifactNaming) -> String {
    match naming {
        ArtifactNaming::Slug => {
            let slug = snake_case(&article.title);
            if slug.is_empty() {
                short_id(RANDOM_ID_LEN)
            } else {
                slug
            }
        }
        ArtifactNaming::RandomId => format!(
            "{}_{}",
            short_id(RANDOM_ID_LEN),
            article.perspective.as_deref().unwrap_or("original")
        ),
    }
}

/// Artifact directory of one source within one run.
#[derive(Debug)]
pub struct SourceArtifacts {
    dir: PathBuf,
    html_dir: PathBuf,
    naming: ArtifactNaming,
    used: HashSet<String>,
}

impl SourceArtifacts {
    /// Create `{run_dir}/{website_name}` (and `html/` when `save_html`).
    #[instrument(level = "debug", skip(run_dir))]
    pub async fn create(
        run_dir: &Path,
        website_name: &str,
        naming: ArtifactNaming,
        save_html: bool,
    ) -> Result<Self, Box<dyn Error>> {
        let dir = run_dir.join(website_name.replace(['/', '\\'], "_"));
        let html_dir = dir.join("html");
        fs::create_dir_all(&dir).await?;
        if save_html {
            fs::create_dir_all(&html_dir).await?;
        }
        Ok(Self {
            dir,
            html_dir,
            naming,
            used: HashSet::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a stem for `article` that no earlier article of this source
    /// used; repeats get `_2`, `_3`, ... appended.
    pub fn reserve_stem(&mut self, article: &Article) -> String {
        let base = artifact_stem(article, self.naming);
        let mut stem = base.clone();
        let mut n = 1;
        while !self.used.insert(stem.clone()) {
            n += 1;
            stem = format!("{base}_{n}");
        }
        stem
    }

    pub async fn write_screenshot(&self, stem: &str, png: &[u8]) -> Result<PathBuf, Box<dyn Error>> {
        let path = self.dir.join(format!("{stem}.png"));
        fs::write(&path, png).await?;
        debug!(path = %path.display(), bytes = png.len(), "Wrote screenshot");
        Ok(path)
    }

    pub async fn write_html(&self, stem: &str, html: &str) -> Result<PathBuf, Box<dyn Error>> {
        fs::create_dir_all(&self.html_dir).await?;
        let path = self.html_dir.join(format!("{stem}.html"));
        fs::write(&path, html).await?;
        debug!(path = %path.display(), "Wrote HTML");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Article {
        Article {
            href: "https://news.example.com/a".to_string(),
            title: title.to_string(),
            content: "Body".to_string(),
            image: "https://cdn.example.com/a.jpg".to_string(),
            perspective: Some("skeptic".to_string()),
            national_news: false,
        }
    }

    #[test]
    fn test_slug_and_random_stems() {
        assert_eq!(
            artifact_stem(&article("Council Votes, Again!"), ArtifactNaming::Slug),
            "council_votes_again"
        );

        let stem = artifact_stem(&article("Anything"), ArtifactNaming::RandomId);
        let (id, perspective) = stem.split_once('_').unwrap();
        assert_eq!(id.len(), RANDOM_ID_LEN);
        assert_eq!(perspective, "skeptic");
    }

    #[tokio::test]
    async fn test_colliding_titles_get_suffixes() {
        let run = tempfile::tempdir().unwrap();
        let mut artifacts = SourceArtifacts::create(run.path(), "Example News", ArtifactNaming::Slug, true)
            .await
            .unwrap();

        let a = article("Same Title");
        assert_eq!(artifacts.reserve_stem(&a), "same_title");
        assert_eq!(artifacts.reserve_stem(&a), "same_title_2");
        assert_eq!(artifacts.reserve_stem(&a), "same_title_3");
    }

    #[tokio::test]
    async fn test_writes_land_in_source_directory() {
        let run = tempfile::tempdir().unwrap();
        let artifacts = SourceArtifacts::create(run.path(), "Example/News", ArtifactNaming::Slug, true)
            .await
            .unwrap();

        let png = artifacts.write_screenshot("story", b"png").await.unwrap();
        let html = artifacts.write_html("story", "<html></html>").await.unwrap();

        assert_eq!(png, run.path().join("Example_News").join("story.png"));
        assert_eq!(html, run.path().join("Example_News/html/story.html"));
        assert_eq!(std::fs::read(&png).unwrap(), b"png");
    }
}
