//! # Session State
//!
//! One `SessionState` holds everything a conversation shares between
//! pipeline stages: the turn history, the travel plan, the research
//! findings, the evaluator's verdict, the citation source table, and the
//! report in its raw and display-ready forms.
//!
//! Stages run one at a time, so the state is passed around as `&mut` and
//! needs no locking. Separate sessions never share a `SessionState`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::evaluation::Feedback;
use crate::grounding::Event;
use crate::sources::SourceRecord;

/// Matches `{key}` and `{key?}` placeholders in instruction templates.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*(\?)?\s*\}").expect("valid placeholder pattern")
});

/// Author name used for user turns.
pub const USER_AUTHOR: &str = "user";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub(crate) events: Vec<Event>,

    /// Number of events already scanned for grounding metadata
    #[serde(default)]
    pub(crate) grounding_cursor: usize,

    #[serde(default)]
    pub(crate) url_to_short_id: HashMap<String, String>,

    #[serde(default)]
    pub(crate) sources: BTreeMap<String, SourceRecord>,

    #[serde(default)]
    research_plan: Option<String>,

    #[serde(default)]
    report_sections: Option<String>,

    #[serde(default)]
    section_research_findings: Option<String>,

    #[serde(default)]
    research_evaluation: Option<Feedback>,

    #[serde(default)]
    final_cited_report: Option<String>,

    #[serde(default)]
    final_report_with_citations: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Turn history
    // -------------------------------------------------------------------------

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Everything the user has said so far, one message per line.
    pub fn user_transcript(&self) -> String {
        self.events
            .iter()
            .filter(|e| e.author == USER_AUTHOR && !e.text.is_empty())
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // -------------------------------------------------------------------------
    // Typed keys
    // -------------------------------------------------------------------------

    pub fn url_to_short_id(&self) -> &HashMap<String, String> {
        &self.url_to_short_id
    }

    pub fn sources(&self) -> &BTreeMap<String, SourceRecord> {
        &self.sources
    }

    /// Source records in the order their short ids were assigned.
    pub fn sources_in_order(&self) -> Vec<&SourceRecord> {
        let mut records: Vec<&SourceRecord> = self.sources.values().collect();
        records.sort_by_key(|r| r.sequence());
        records
    }

    pub fn research_plan(&self) -> Option<&str> {
        self.research_plan.as_deref()
    }

    pub fn set_research_plan(&mut self, plan: impl Into<String>) {
        self.research_plan = Some(plan.into());
    }

    pub fn report_sections(&self) -> Option<&str> {
        self.report_sections.as_deref()
    }

    pub fn set_report_sections(&mut self, sections: impl Into<String>) {
        self.report_sections = Some(sections.into());
    }

    pub fn section_research_findings(&self) -> Option<&str> {
        self.section_research_findings.as_deref()
    }

    pub fn set_section_research_findings(&mut self, findings: impl Into<String>) {
        self.section_research_findings = Some(findings.into());
    }

    pub fn research_evaluation(&self) -> Option<&Feedback> {
        self.research_evaluation.as_ref()
    }

    pub fn set_research_evaluation(&mut self, feedback: Feedback) {
        self.research_evaluation = Some(feedback);
    }

    pub fn clear_research_evaluation(&mut self) {
        self.research_evaluation = None;
    }

    pub fn final_cited_report(&self) -> Option<&str> {
        self.final_cited_report.as_deref()
    }

    pub fn set_final_cited_report(&mut self, report: impl Into<String>) {
        self.final_cited_report = Some(report.into());
    }

    pub fn final_report_with_citations(&self) -> Option<&str> {
        self.final_report_with_citations.as_deref()
    }

    pub fn set_final_report_with_citations(&mut self, report: impl Into<String>) {
        self.final_report_with_citations = Some(report.into());
    }

    // -------------------------------------------------------------------------
    // Instruction templating
    // -------------------------------------------------------------------------

    /// Render a state key as prompt text. `None` when the key is unset or
    /// unknown.
    fn value_for(&self, key: &str) -> Result<Option<String>> {
        let value = match key {
            "research_plan" => self.research_plan.clone(),
            "report_sections" => self.report_sections.clone(),
            "section_research_findings" => self.section_research_findings.clone(),
            "final_cited_report" => self.final_cited_report.clone(),
            "final_report_with_citations" => self.final_report_with_citations.clone(),
            "research_evaluation" => match &self.research_evaluation {
                Some(feedback) => Some(serde_json::to_string_pretty(feedback)?),
                None => None,
            },
            "sources" => Some(serde_json::to_string_pretty(&self.sources_in_order())?),
            "url_to_short_id" => Some(serde_json::to_string_pretty(&self.url_to_short_id)?),
            _ => None,
        };
        Ok(value)
    }

    /// Substitute `{key}` and `{key?}` placeholders with state values.
    ///
    /// A missing optional key renders as empty text; a missing required key
    /// is an error.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut missing: Option<String> = None;
        let mut failure: Option<AgentError> = None;

        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            let optional = caps.get(2).is_some();
            match self.value_for(key) {
                Ok(Some(value)) => value,
                Ok(None) => {
                    if !optional && missing.is_none() {
                        missing = Some(key.to_string());
                    }
                    String::new()
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        if let Some(key) = missing {
            return Err(AgentError::MissingState { key });
        }
        Ok(rendered.into_owned())
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let state = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Session loaded");
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        debug!(path = %path.display(), "Session saved");
        Ok(())
    }
}
