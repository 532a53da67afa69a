//! JavaScript rendering for page operations.
//!
//! Every script is a self-invoking expression. Selectors and values are
//! embedded as JSON string literals, so arbitrary text is safe to inject.
//! Mutation scripts return the number of elements they touched.

use super::{DomPatch, Scope};
use serde_json::Value;

fn literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    // Serializing strings and string lists cannot fail.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn targets(selector: &str, scope: Scope) -> String {
    let selector = literal(selector);
    match scope {
        Scope::First => format!(
            "const first = document.querySelector({selector}); const targets = first ? [first] : [];"
        ),
        Scope::All => {
            format!("const targets = Array.from(document.querySelectorAll({selector}));")
        }
    }
}

fn patch_body(patch: &DomPatch) -> String {
    match patch {
        DomPatch::SetText(text) => format!("el.innerText = {};", literal(text)),
        DomPatch::SetStyles(styles) => styles
            .iter()
            .map(|(property, value)| {
                format!(
                    "el.style.setProperty({}, {});",
                    literal(property),
                    literal(value)
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        DomPatch::SetClassName(class_name) => format!("el.className = {};", literal(class_name)),
        DomPatch::Remove => "el.remove();".to_string(),
        DomPatch::ReplaceTags(tags) => format!(
            "const tags = {}; if (i < tags.length) {{ el.innerText = tags[i]; }} else {{ el.style.display = 'none'; }}",
            literal(tags)
        ),
    }
}

/// Script applying `patch` to the elements matching `selector`.
pub fn patch(selector: &str, scope: Scope, patch: &DomPatch) -> String {
    format!(
        "(() => {{ {} targets.forEach((el, i) => {{ {} }}); return targets.length; }})()",
        targets(selector, scope),
        patch_body(patch)
    )
}

/// Script swapping an `<img>` source and resolving on its load event.
///
/// Any responsive `srcset` is cleared first, otherwise the browser keeps
/// showing the candidate it already picked.
pub fn load_image(selector: &str, src: &str) -> String {
    let selector = literal(selector);
    let src = literal(src);
    format!(
        "(() => {{ const el = document.querySelector({selector}); if (!el) {{ return 0; }} \
         return new Promise((resolve, reject) => {{ \
         el.onload = () => resolve(1); \
         el.onerror = () => reject(new Error('image failed to load: ' + {src})); \
         el.removeAttribute('srcset'); el.srcset = ''; \
         el.style.objectFit = 'cover'; \
         el.src = {src}; }}); }})()"
    )
}

/// Script returning whether an element matching `selector` exists.
pub fn exists(selector: &str) -> String {
    format!("document.querySelector({}) !== null", literal(selector))
}

/// Script returning whether the first element matching `selector` is visible.
pub fn is_visible(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) {{ return false; }} \
         const style = window.getComputedStyle(el); const rect = el.getBoundingClientRect(); \
         return style.visibility !== 'hidden' && style.display !== 'none' && (rect.width > 0 || rect.height > 0); }})()",
        literal(selector)
    )
}

/// Interpret a mutation script's return value.
pub fn matched_count(value: &Value) -> usize {
    value.as_u64().unwrap_or_default() as usize
}
