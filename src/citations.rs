//! # Citation Post-Processing
//!
//! The report composer marks claims with inline tags such as
//! `<cite source="src-3" />`. This module swaps each tag for a Markdown link
//! to the cited source and tidies the spacing left behind.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::sources::SourceRecord;
use crate::state::SessionState;

/// `<cite source="src-N" />`, with or without quotes and tolerant of
/// whitespace around `=` and before `/>`.
static CITE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<cite\s+source\s*=\s*["']?\s*(src-\d+)\s*["']?\s*/>"#)
        .expect("valid citation pattern")
});

static SPACE_BEFORE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:])").expect("valid punctuation pattern"));

/// Replace every citation tag in `report` with ` [title](url)`.
///
/// Tags naming an unknown source are dropped with a warning.
pub fn replace_citations(report: &str, sources: &BTreeMap<String, SourceRecord>) -> String {
    let mut dropped = 0usize;

    let linked = CITE_TAG.replace_all(report, |caps: &Captures| {
        let short_id = &caps[1];
        match sources.get(short_id) {
            Some(source) => format!(" [{}]({})", source.display_text(), source.url),
            None => {
                warn!(tag = %&caps[0], "Invalid citation tag found and removed");
                dropped += 1;
                String::new()
            }
        }
    });

    if dropped > 0 {
        info!(dropped, "Unresolvable citations removed from report");
    }

    SPACE_BEFORE_PUNCTUATION
        .replace_all(&linked, "$1")
        .into_owned()
}

/// Turn the session's raw cited report into the final display report and
/// store it under `final_report_with_citations`.
pub fn citation_replacement(state: &mut SessionState) -> String {
    let raw = state.final_cited_report().unwrap_or_default();
    let processed = replace_citations(raw, state.sources());
    state.set_final_report_with_citations(processed.clone());
    processed
}
