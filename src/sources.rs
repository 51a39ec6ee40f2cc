//! # Research Sources
//!
//! Turns the grounding metadata attached to research turns into the session's
//! citation source table: each distinct URL gets a stable short id
//! (`src-1`, `src-2`, ...) in first-seen order, and every supported claim
//! that references the URL is recorded on its source.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::state::SessionState;

/// Confidence recorded when a support carries fewer scores than chunk
/// references.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const SHORT_ID_PREFIX: &str = "src-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedClaim {
    pub text_segment: String,
    pub confidence: f64,
}

/// One distinct source URL seen during research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub short_id: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    #[serde(default)]
    pub supported_claims: Vec<SupportedClaim>,
}

impl SourceRecord {
    /// Text shown for a citation link: the title, or the domain when there
    /// is no title.
    pub fn display_text(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else if !self.domain.is_empty() {
            &self.domain
        } else {
            &self.short_id
        }
    }

    /// Numeric part of the short id, used to keep assignment order.
    pub fn sequence(&self) -> usize {
        self.short_id
            .strip_prefix(SHORT_ID_PREFIX)
            .and_then(|n| n.parse().ok())
            .unwrap_or(usize::MAX)
    }
}

pub fn short_id_for(n: usize) -> String {
    format!("{SHORT_ID_PREFIX}{n}")
}

/// Collect web sources and their supported claims from every turn not yet
/// scanned, and record them in the session's source table.
///
/// Returns the number of new sources. Running it again without new turns
/// leaves the state unchanged.
pub fn collect_research_sources(state: &mut SessionState) -> usize {
    let SessionState {
        events,
        grounding_cursor,
        url_to_short_id,
        sources,
        ..
    } = state;

    let start = (*grounding_cursor).min(events.len());
    let mut added = 0;

    for event in &events[start..] {
        let Some(metadata) = event.grounding_metadata.as_ref() else {
            continue;
        };
        if metadata.grounding_chunks.is_empty() {
            continue;
        }

        // chunk position -> short id, for this turn only
        let mut chunk_ids: HashMap<usize, String> = HashMap::new();

        for (idx, chunk) in metadata.grounding_chunks.iter().enumerate() {
            let Some(web) = chunk.web.as_ref() else {
                continue;
            };

            let short_id = match url_to_short_id.get(&web.uri) {
                Some(existing) => existing.clone(),
                None => {
                    let short_id = short_id_for(url_to_short_id.len() + 1);
                    let title = if web.title == web.domain || web.title.is_empty() {
                        web.domain.clone()
                    } else {
                        web.title.clone()
                    };

                    debug!(short_id = %short_id, url = %web.uri, "New research source");
                    url_to_short_id.insert(web.uri.clone(), short_id.clone());
                    sources.insert(
                        short_id.clone(),
                        SourceRecord {
                            short_id: short_id.clone(),
                            title,
                            url: web.uri.clone(),
                            domain: web.domain.clone(),
                            supported_claims: Vec::new(),
                        },
                    );
                    added += 1;
                    short_id
                }
            };
            chunk_ids.insert(idx, short_id);
        }

        for support in &metadata.grounding_supports {
            let text_segment = support
                .segment
                .as_ref()
                .map(|s| s.text.clone())
                .unwrap_or_default();

            for (i, chunk_idx) in support.grounding_chunk_indices.iter().enumerate() {
                let Some(short_id) = chunk_ids.get(chunk_idx) else {
                    continue;
                };
                let confidence = support
                    .confidence_scores
                    .get(i)
                    .copied()
                    .unwrap_or(DEFAULT_CONFIDENCE);

                if let Some(record) = sources.get_mut(short_id) {
                    record.supported_claims.push(SupportedClaim {
                        text_segment: text_segment.clone(),
                        confidence,
                    });
                }
            }
        }
    }

    *grounding_cursor = events.len();

    if added > 0 {
        info!(new = added, total = url_to_short_id.len(), "Research sources collected");
    }
    added
}
