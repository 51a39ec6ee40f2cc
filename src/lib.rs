//! # LuxMap Agent
//!
//! A conversational travel planner built with the Rig framework. LuxMap
//! drafts a travel plan with the user, and once the plan is approved runs a
//! research pipeline: web research, critique and refinement, then a report
//! whose inline citation tags are turned into Markdown links.
//!
//! ```ignore
//! use std::sync::Arc;
//! use luxmap_agent::{Config, InteractivePlanner, OllamaModel, SessionState};
//!
//! let config = Config::from_env()?;
//! let planner = InteractivePlanner::new(&config, Arc::new(OllamaModel::new(&config)));
//! let mut session = SessionState::new();
//! let reply = planner.handle(&mut session, "Four days in Istanbul").await?;
//! ```

pub mod agent;
pub mod citations;
pub mod config;
pub mod error;
pub mod escalation;
pub mod evaluation;
pub mod grounding;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod sources;
pub mod state;
pub mod tools;

pub use agent::{build_research_pipeline, InteractivePlanner, LlmStage, PlannerReply};
pub use citations::{citation_replacement, replace_citations};
pub use config::Config;
pub use error::{AgentError, Result};
pub use escalation::{EscalationChecker, LoopSignal};
pub use evaluation::{Feedback, Grade, SearchQuery};
pub use grounding::{Event, GroundingChunk, GroundingMetadata, GroundingSupport, Segment, WebSource};
pub use llm::{LanguageModel, ModelRequest, ModelTurn, OllamaModel};
pub use pipeline::{RefinementLoop, Sequential, Stage};
pub use sources::{collect_research_sources, SourceRecord, SupportedClaim};
pub use state::SessionState;
pub use tools::{SearchResult, WebSearchTool};
