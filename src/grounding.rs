//! # Grounding Module
//!
//! Turn events and the grounding metadata a model attaches to them.
//!
//! A grounding chunk is one piece of retrieved evidence (a web page); a
//! grounding support ties a span of the generated text to one or more chunks
//! by position, optionally with a confidence score per chunk reference.

use serde::{Deserialize, Serialize};

use crate::tools::SearchResult;

/// One turn in the session history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the stage (or `user`) that produced the turn
    pub author: String,

    /// Text content of the turn, if any
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,

    /// Set by loop-control stages to end the enclosing loop
    #[serde(default)]
    pub escalate: bool,
}

impl Event {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_grounding(mut self, metadata: Option<GroundingMetadata>) -> Self {
        self.grounding_metadata = metadata;
        self
    }

    pub fn escalation(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            escalate: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,

    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

impl GroundingMetadata {
    /// Build grounding metadata from the results a web search returned
    /// during a turn.
    ///
    /// Every result becomes a web chunk, and its snippet becomes a support
    /// for that chunk. No confidence is known for these supports.
    pub fn from_search_results(results: &[SearchResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let grounding_chunks = results
            .iter()
            .map(|r| GroundingChunk {
                web: Some(WebSource {
                    uri: r.url.clone(),
                    title: r.title.clone(),
                    domain: r.domain.clone(),
                }),
            })
            .collect();

        let grounding_supports = results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.snippet.is_empty())
            .map(|(idx, r)| GroundingSupport {
                segment: Some(Segment {
                    text: r.snippet.clone(),
                }),
                grounding_chunk_indices: vec![idx],
                confidence_scores: Vec::new(),
            })
            .collect();

        Some(Self {
            grounding_chunks,
            grounding_supports,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    /// Present only for web evidence
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    pub title: String,
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingSupport {
    #[serde(default)]
    pub segment: Option<Segment>,

    /// Positions into the turn's `grounding_chunks`
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,

    /// Parallel to `grounding_chunk_indices`; may be shorter
    #[serde(default)]
    pub confidence_scores: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub text: String,
}
