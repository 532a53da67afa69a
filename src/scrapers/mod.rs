//! Scraping of configured news sources.
//!
//! Scraping runs in two phases per source, on one shared page:
//!
//! 1. **Indexing** ([`collector`]): walk the listing page, clicking its
//!    pagination control, and gather article links
//! 2. **Fetching** ([`extractor`]): open each link and pull title, lead
//!    image and body text with the source's selectors
//!
//! Both phases are driven through [`crate::browser::PageContext`], so they
//! see pages after scripts have run. Failures are logged and the link or
//! source is skipped; nothing here aborts the run.

pub mod collector;
pub mod extractor;
