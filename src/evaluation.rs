//! # Research Evaluation
//!
//! The verdict the research evaluator produces after each research pass,
//! and the parser that pulls it out of raw model output.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Pass,
    Fail,
}

/// A targeted follow-up web search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub grade: Grade,

    #[serde(default)]
    pub comment: String,

    /// Only meaningful for a failing grade
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_queries: Option<Vec<SearchQuery>>,
}

impl Feedback {
    pub fn is_pass(&self) -> bool {
        self.grade == Grade::Pass
    }

    /// Parse a verdict from model output.
    ///
    /// Accepts bare JSON, JSON inside a Markdown code fence, or JSON
    /// surrounded by prose. A passing verdict never keeps follow-up queries.
    pub fn parse(text: &str) -> Result<Self> {
        let json = extract_json_object(text)
            .ok_or_else(|| AgentError::InvalidEvaluation("no JSON object in output".to_string()))?;

        let mut feedback: Feedback = serde_json::from_str(json)
            .map_err(|e| AgentError::InvalidEvaluation(e.to_string()))?;

        match feedback.grade {
            Grade::Pass => feedback.follow_up_queries = None,
            Grade::Fail => {
                if let Some(queries) = feedback.follow_up_queries.as_mut() {
                    queries.retain(|q| !q.search_query.trim().is_empty());
                }
            }
        }

        Ok(feedback)
    }

    /// Follow-up query strings, empty for a passing verdict.
    pub fn queries(&self) -> Vec<&str> {
        self.follow_up_queries
            .iter()
            .flatten()
            .map(|q| q.search_query.as_str())
            .collect()
    }
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
