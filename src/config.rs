//! Sites file loading and runtime settings.
//!
//! The sites file is a single YAML document that describes everything a run
//! needs besides the rewrite service:
//!
//! ```yaml
//! settings:
//!   articlesPerSource: 25
//!   headless: true
//! perspectives:
//!   neutral: "You are a news reporter with politically neutral views"
//! tags: [HOME, WEATHER, SPORTS]
//! authors:
//!   - name: Jane Doe
//!     image: https://example.com/jane.jpg
//! templates:
//!   tagdiv:
//!     baseUrl: https://demo.example.com/post/
//!     titleSelector: h1.tdb-title-text
//! sources:
//!   - baseUrl: https://news.example.com/
//!     websiteName: Heart of Example News
//!     template: tagdiv
//!     perspective: neutral
//!     selectors: { anchor: a.story, title: h1, image: img.lead, content: div.body }
//! ```
//!
//! [`SiteConfig::load`] parses the file, resolves per-source defaults, and
//! validates cross references so the pipeline never meets a dangling template
//! or perspective name.

use crate::models::{Author, Source, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Errors raised while loading the sites file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read sites file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse sites file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("source {source_name:?} references unknown template {template:?}")]
    UnknownTemplate {
        source_name: String,
        template: String,
    },
    #[error("source {source_name:?} references unknown perspective {perspective:?}")]
    UnknownPerspective {
        source_name: String,
        perspective: String,
    },
    #[error("sites file defines no sources")]
    NoSources,
}

/// What the link collector does when a post-click navigation wait times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SoftTimeoutPolicy {
    /// Scan the same page again; new links may have rendered without a navigation.
    #[default]
    Rescan,
    /// Stop collecting for this source.
    Stop,
}

/// How screenshot and HTML artifacts are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactNaming {
    /// snake_case slug of the rewritten title.
    #[default]
    Slug,
    /// Short random identifier followed by the perspective key.
    RandomId,
}

/// Run-wide knobs. Every field has a default, so `settings:` may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub navigation_timeout_ms: u64,
    pub image_wait_ms: u64,
    pub pagination_wait_ms: u64,
    pub click_wait_ms: u64,
    pub template_wait_ms: u64,
    pub settle_delay_ms: u64,
    pub image_load_timeout_ms: u64,
    pub articles_per_source: usize,
    pub max_rewrites_per_source: Option<usize>,
    pub rewrite_concurrency: usize,
    pub headline_max_characters: usize,
    pub content_max_paragraphs: usize,
    pub save_raw_html: bool,
    pub artifact_naming: ArtifactNaming,
    pub soft_timeout_policy: SoftTimeoutPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewport_width: 3328,
            viewport_height: 1872,
            headless: true,
            chrome_executable: None,
            navigation_timeout_ms: 15_000,
            image_wait_ms: 1_000,
            pagination_wait_ms: 15_000,
            click_wait_ms: 3_000,
            template_wait_ms: 15_000,
            settle_delay_ms: 1_000,
            image_load_timeout_ms: 15_000,
            articles_per_source: 100,
            max_rewrites_per_source: None,
            rewrite_concurrency: 4,
            headline_max_characters: 75,
            content_max_paragraphs: 12,
            save_raw_html: true,
            artifact_naming: ArtifactNaming::Slug,
            soft_timeout_policy: SoftTimeoutPolicy::Rescan,
        }
    }
}

impl Settings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn image_wait(&self) -> Duration {
        Duration::from_millis(self.image_wait_ms)
    }

    pub fn pagination_wait(&self) -> Duration {
        Duration::from_millis(self.pagination_wait_ms)
    }

    pub fn click_wait(&self) -> Duration {
        Duration::from_millis(self.click_wait_ms)
    }

    pub fn template_wait(&self) -> Duration {
        Duration::from_millis(self.template_wait_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn image_load_timeout(&self) -> Duration {
        Duration::from_millis(self.image_load_timeout_ms)
    }
}

/// The parsed sites file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub settings: Settings,
    pub templates: BTreeMap<String, Template>,
    /// Perspective key -> instruction prefixed to every rewrite prompt.
    pub perspectives: BTreeMap<String, String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Replacement labels for the template's navigation tags.
    #[serde(default)]
    pub tags: Vec<String>,
    pub sources: Vec<Source>,
}

impl SiteConfig {
    /// Load, resolve, and validate a sites file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, defines no
    /// sources, or references a template or perspective that does not exist.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        info!(
            sources = config.sources.len(),
            templates = config.templates.len(),
            perspectives = config.perspectives.len(),
            "Loaded sites file"
        );
        Ok(config)
    }

    /// Parse a sites document and fill in per-source defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        let mut config: SiteConfig = serde_yaml::from_str(raw)?;
        config.resolve_defaults();
        Ok(config)
    }

    fn resolve_defaults(&mut self) {
        let default_max = self.settings.articles_per_source;
        for source in &mut self.sources {
            source.max_number_of_articles.get_or_insert(default_max);
        }
    }

    /// Check that every source points at a known template and perspective.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            if !self.templates.contains_key(&source.template) {
                return Err(ConfigError::UnknownTemplate {
                    source_name: source.website_name.clone(),
                    template: source.template.clone(),
                });
            }
            if !self.perspectives.contains_key(&source.perspective) {
                return Err(ConfigError::UnknownPerspective {
                    source_name: source.website_name.clone(),
                    perspective: source.perspective.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn template_for(&self, source: &Source) -> Option<&Template> {
        self.templates.get(&source.template)
    }

    pub fn perspective_prompt(&self, source: &Source) -> Option<&str> {
        self.perspectives.get(&source.perspective).map(String::as_str)
    }
}
