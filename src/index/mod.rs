//! Hierarchy aggregator and the static index page built from it.

use crate::models::{FixtureMeta, NestedIndex};
use crate::utils::escape_html;
use anyhow::{Context, Result};

const TEMPLATE: &str = include_str!("template.html");

/// Group team calendars as season → division → team → relative path.
/// Siblings come out sorted by name; a repeated team keeps the last path.
pub fn aggregate(metas: &[FixtureMeta], extension: &str) -> NestedIndex {
    let mut nested = NestedIndex::new();

    for meta in metas {
        nested
            .entry(meta.season.clone())
            .or_default()
            .entry(meta.division.clone())
            .or_default()
            .insert(meta.team.clone(), meta.relative_path(extension));
    }

    nested
}

/// Render the index page with the lookup table inlined for the client-side selectors.
pub fn render(index: &NestedIndex, title: &str) -> Result<String> {
    let data = serde_json::to_string_pretty(index).context("Failed to serialise index")?;
    // A team called "</script>" must not end the script element early.
    let data = data.replace("</", "<\\/");

    // Each placeholder is filled in the template text only, never inside an
    // already substituted value.
    let title = escape_html(title);
    let page = TEMPLATE
        .split("{{DATA}}")
        .map(|part| part.replace("{{TITLE}}", &title))
        .collect::<Vec<_>>()
        .join(&data);

    Ok(page)
}
