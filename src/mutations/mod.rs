//! DOM mutation operations for rendering articles into a template.
//!
//! The [`compiler`] turns a template, an article, and its source into a flat
//! list of [`MutationOperation`]s. The [`executor`] applies that list to a
//! live page, all operations at once, and reports each one's outcome.
//!
//! Operations are independent of each other: their order carries no meaning
//! and none reads another's effect.

pub mod compiler;
pub mod executor;

use std::fmt;

/// How an image slot receives a new picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Set CSS background properties on a container.
    BackgroundFill,
    /// Replace the `src` of an `<img>` element.
    DirectAttribute,
}

/// The site-name slots a template can expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteName {
    Full(String),
    Short(String),
    NewsFrom(String),
}

impl SiteName {
    /// The literal text written into the slot.
    pub fn text(&self) -> String {
        match self {
            SiteName::Full(name) | SiteName::Short(name) => name.clone(),
            SiteName::NewsFrom(region) => format!("News from {region}"),
        }
    }
}

/// One atomic change to the template page.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOperation {
    /// Replace the text of the first match.
    SetText { selector: String, text: String },
    /// Replace the text of every match.
    SetTextAll { selector: String, text: String },
    SwapImage {
        selector: String,
        src: String,
        fill: FillMode,
    },
    /// Set a custom property on the document root.
    SetCssVariable { name: String, value: String },
    /// Make every match invisible while keeping its layout box.
    Hide { selector: String },
    /// Remove every match from the document.
    Delete { selector: String },
    /// Relabel the first `tags.len()` matches and hide the rest.
    ReplaceTagList { selector: String, tags: Vec<String> },
    RewriteClassName { selector: String, class_name: String },
    ApplyStyles {
        selector: String,
        styles: Vec<(String, String)>,
    },
    OverwriteBackgroundColor { selector: String, color: String },
    OverwriteColor { selector: String, color: String },
    ReplaceName { selector: String, name: SiteName },
}

/// Discriminant of a [`MutationOperation`], for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    SetText,
    SetTextAll,
    SwapImage,
    SetCssVariable,
    Hide,
    Delete,
    ReplaceTagList,
    RewriteClassName,
    ApplyStyles,
    OverwriteBackgroundColor,
    OverwriteColor,
    ReplaceName,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Selector for custom properties set by [`MutationOperation::SetCssVariable`].
pub const ROOT_SELECTOR: &str = ":root";

impl MutationOperation {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationOperation::SetText { .. } => MutationKind::SetText,
            MutationOperation::SetTextAll { .. } => MutationKind::SetTextAll,
            MutationOperation::SwapImage { .. } => MutationKind::SwapImage,
            MutationOperation::SetCssVariable { .. } => MutationKind::SetCssVariable,
            MutationOperation::Hide { .. } => MutationKind::Hide,
            MutationOperation::Delete { .. } => MutationKind::Delete,
            MutationOperation::ReplaceTagList { .. } => MutationKind::ReplaceTagList,
            MutationOperation::RewriteClassName { .. } => MutationKind::RewriteClassName,
            MutationOperation::ApplyStyles { .. } => MutationKind::ApplyStyles,
            MutationOperation::OverwriteBackgroundColor { .. } => {
                MutationKind::OverwriteBackgroundColor
            }
            MutationOperation::OverwriteColor { .. } => MutationKind::OverwriteColor,
            MutationOperation::ReplaceName { .. } => MutationKind::ReplaceName,
        }
    }

    /// The CSS selector this operation targets.
    pub fn selector(&self) -> &str {
        match self {
            MutationOperation::SetCssVariable { .. } => ROOT_SELECTOR,
            MutationOperation::SetText { selector, .. }
            | MutationOperation::SetTextAll { selector, .. }
            | MutationOperation::SwapImage { selector, .. }
            | MutationOperation::Hide { selector }
            | MutationOperation::Delete { selector }
            | MutationOperation::ReplaceTagList { selector, .. }
            | MutationOperation::RewriteClassName { selector, .. }
            | MutationOperation::ApplyStyles { selector, .. }
            | MutationOperation::OverwriteBackgroundColor { selector, .. }
            | MutationOperation::OverwriteColor { selector, .. }
            | MutationOperation::ReplaceName { selector, .. } => selector,
        }
    }
}
