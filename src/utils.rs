//! Utility functions for string cleanup, naming, dates, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging
//! - Headline cleanup and snake_case slugs for artifact names
//! - Run timestamps and randomized "recent" bylines dates
//! - File system validation for output directories

use chrono::{DateTime, Datelike, Duration, Local, TimeZone};
use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static EMPHASIS_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*|\*\*$").expect("static regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]|_").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Strip the decorations text generators like to put around a headline.
///
/// Removes one pair of wrapping double quotes, then leading and trailing
/// `**` bold markers.
pub fn clean_headline(raw: &str) -> String {
    let mut headline = raw.trim();
    if headline.len() >= 2 && headline.starts_with('"') && headline.ends_with('"') {
        headline = &headline[1..headline.len() - 1];
    }
    EMPHASIS_MARKERS.replace_all(headline, "").trim().to_string()
}

/// Convert a title to a file-name friendly snake_case slug.
///
/// Punctuation and underscores are dropped, runs of whitespace become a
/// single underscore.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(snake_case("Hello, World!"), "hello_world");
/// ```
pub fn snake_case(title: &str) -> String {
    let cleaned = NON_WORD.replace_all(title, "");
    WHITESPACE
        .replace_all(cleaned.trim(), "_")
        .to_lowercase()
}

/// A short random alphanumeric identifier.
pub fn short_id(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Timestamp used for the per-run artifact directory, e.g. `2026-10-19_08-05-09`.
pub fn run_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Day of month with its English ordinal suffix.
pub fn ordinal_day(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// Long-form date used in bylines, e.g. `October 19th, 2026`.
pub fn byline_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} {}, {}",
        at.format("%B"),
        ordinal_day(at.day()),
        at.year()
    )
}

/// A byline date drawn uniformly from the last three months.
pub fn random_recent_date() -> String {
    let now = Local::now();
    let window = Duration::days(91).num_seconds();
    let offset = rng().random_range(0..=window);
    byline_date(&(now - Duration::seconds(offset)))
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
