//! # Agent Module
//!
//! The LuxMap agents and how they are wired together.
//!
//! ```text
//! interactive planner ──(plan / refine)──▶ plan_generator
//!        │
//!        └──(approved)──▶ research_pipeline
//!                           section_planner
//!                           section_researcher ──▶ collect sources
//!                           iterative_refinement_loop (max N)
//!                             research_evaluator
//!                             escalation_checker ──(pass)──▶ exit loop
//!                             enhanced_search_executor ──▶ collect sources
//!                           report_composer ──▶ replace citations
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::citations::citation_replacement;
use crate::config::Config;
use crate::error::Result;
use crate::escalation::EscalationChecker;
use crate::evaluation::Feedback;
use crate::grounding::Event;
use crate::llm::{LanguageModel, ModelRequest};
use crate::pipeline::{RefinementLoop, Sequential, Stage};
use crate::prompts::{TravelPrompts, EXECUTE_DECISION};
use crate::sources::collect_research_sources;
use crate::state::{SessionState, USER_AUTHOR};

/// Prompt used when a stage works from state alone.
const PROCEED_PROMPT: &str = "Proceed with your task using the information provided in your instructions.";

/// Where a stage's output lands in the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    ResearchPlan,
    ReportSections,
    SectionResearchFindings,
    ResearchEvaluation,
    FinalCitedReport,
}

/// Work done on the state after a stage's output is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterCallback {
    CollectSources,
    ReplaceCitations,
}

/// A stage backed by one model call.
pub struct LlmStage {
    name: String,
    model_name: String,
    instruction: String,
    web_search: bool,
    include_history: bool,
    keep_grounding: bool,
    output_key: OutputKey,
    after: Option<AfterCallback>,
    model: Arc<dyn LanguageModel>,
}

impl LlmStage {
    pub fn new(
        name: impl Into<String>,
        model_name: impl Into<String>,
        instruction: impl Into<String>,
        output_key: OutputKey,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            name: name.into(),
            model_name: model_name.into(),
            instruction: instruction.into(),
            web_search: false,
            include_history: false,
            keep_grounding: true,
            output_key,
            after: None,
            model,
        }
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    /// Send what the user has said so far as the prompt.
    pub fn with_history(mut self) -> Self {
        self.include_history = true;
        self
    }

    /// Record this stage's turns without grounding, keeping its searches
    /// out of the session's source table.
    pub fn with_private_grounding(mut self) -> Self {
        self.keep_grounding = false;
        self
    }

    pub fn with_after(mut self, callback: AfterCallback) -> Self {
        self.after = Some(callback);
        self
    }

    fn store_output(&self, state: &mut SessionState, text: &str) {
        match self.output_key {
            OutputKey::ResearchPlan => state.set_research_plan(text),
            OutputKey::ReportSections => state.set_report_sections(text),
            OutputKey::SectionResearchFindings => state.set_section_research_findings(text),
            OutputKey::FinalCitedReport => state.set_final_cited_report(text),
            OutputKey::ResearchEvaluation => match Feedback::parse(text) {
                Ok(feedback) => {
                    info!(
                        stage = %self.name,
                        grade = ?feedback.grade,
                        follow_ups = feedback.queries().len(),
                        "Research evaluated"
                    );
                    state.set_research_evaluation(feedback);
                }
                Err(e) => {
                    // No usable verdict means another refinement pass
                    warn!(stage = %self.name, error = %e, "Discarding unparseable evaluation");
                    state.clear_research_evaluation();
                }
            },
        }
    }
}

#[async_trait]
impl Stage for LlmStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &mut SessionState) -> Result<()> {
        let preamble = state.render(&self.instruction)?;
        let transcript = state.user_transcript();
        let prompt = if self.include_history && !transcript.is_empty() {
            transcript
        } else {
            PROCEED_PROMPT.to_string()
        };

        info!(stage = %self.name, model = %self.model_name, "Running agent");
        let turn = self
            .model
            .complete(ModelRequest {
                model: self.model_name.clone(),
                preamble,
                prompt,
                web_search: self.web_search,
            })
            .await?;
        debug!(stage = %self.name, chars = turn.text.len(), "Agent responded");

        let grounding = if self.keep_grounding { turn.grounding } else { None };
        state.push_event(Event::new(self.name.clone(), turn.text.clone()).with_grounding(grounding));
        self.store_output(state, &turn.text);

        match self.after {
            Some(AfterCallback::CollectSources) => {
                collect_research_sources(state);
            }
            Some(AfterCallback::ReplaceCitations) => {
                citation_replacement(state);
            }
            None => {}
        }
        Ok(())
    }
}

pub fn plan_generator(config: &Config, model: Arc<dyn LanguageModel>) -> LlmStage {
    LlmStage::new(
        "plan_generator",
        &config.worker_model,
        TravelPrompts::plan_generator(),
        OutputKey::ResearchPlan,
        model,
    )
    .with_web_search()
    .with_history()
    .with_private_grounding()
}

/// The fixed research pipeline that runs once a plan is approved.
pub fn build_research_pipeline(config: &Config, model: Arc<dyn LanguageModel>) -> Sequential {
    let section_planner = LlmStage::new(
        "section_planner",
        &config.worker_model,
        TravelPrompts::section_planner(),
        OutputKey::ReportSections,
        model.clone(),
    )
    .with_history();

    let section_researcher = LlmStage::new(
        "section_researcher",
        &config.worker_model,
        TravelPrompts::section_researcher(),
        OutputKey::SectionResearchFindings,
        model.clone(),
    )
    .with_web_search()
    .with_history()
    .with_after(AfterCallback::CollectSources);

    let research_evaluator = LlmStage::new(
        "research_evaluator",
        &config.critic_model,
        TravelPrompts::research_evaluator(),
        OutputKey::ResearchEvaluation,
        model.clone(),
    );

    let enhanced_search_executor = LlmStage::new(
        "enhanced_search_executor",
        &config.worker_model,
        TravelPrompts::enhanced_search_executor(),
        OutputKey::SectionResearchFindings,
        model.clone(),
    )
    .with_web_search()
    .with_after(AfterCallback::CollectSources);

    let report_composer = LlmStage::new(
        "report_composer_with_citations",
        &config.critic_model,
        TravelPrompts::report_composer(),
        OutputKey::FinalCitedReport,
        model,
    )
    .with_after(AfterCallback::ReplaceCitations);

    let refinement = RefinementLoop::new("iterative_refinement_loop", config.max_search_iterations)
        .then(research_evaluator)
        .then(EscalationChecker::new("escalation_checker"))
        .then(enhanced_search_executor);

    Sequential::new("research_pipeline")
        .then(section_planner)
        .then(section_researcher)
        .then(refinement)
        .then(report_composer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerDecision {
    Plan,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerReply {
    /// A new or revised travel plan awaiting approval
    Plan(String),
    /// The final, citation-linked travel report
    Report(String),
}

/// The conversational entry point: plans with the user, then runs the
/// research pipeline once the plan is approved.
pub struct InteractivePlanner {
    coordinator_model: String,
    model: Arc<dyn LanguageModel>,
    plan_generator: LlmStage,
    pipeline: Sequential,
}

impl InteractivePlanner {
    pub const NAME: &'static str = "interactive_planner_agent";

    pub fn new(config: &Config, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            coordinator_model: config.worker_model.clone(),
            plan_generator: plan_generator(config, model.clone()),
            pipeline: build_research_pipeline(config, model.clone()),
            model,
        }
    }

    /// Handle one user message.
    pub async fn handle(&self, state: &mut SessionState, message: &str) -> Result<PlannerReply> {
        state.push_event(Event::new(USER_AUTHOR, message));

        let decision = if state.research_plan().is_none() {
            PlannerDecision::Plan
        } else {
            self.decide(state, message).await?
        };

        match decision {
            PlannerDecision::Plan => self.plan(state).await,
            PlannerDecision::Execute => self.execute(state).await,
        }
    }

    /// Run the research pipeline on the current plan, drafting one first if
    /// there is none.
    pub async fn execute(&self, state: &mut SessionState) -> Result<PlannerReply> {
        if state.research_plan().is_none() {
            warn!("No approved plan yet; drafting one first");
            return self.plan(state).await;
        }

        info!("Plan approved, running research pipeline");
        self.pipeline.run(state).await?;
        let report = state.final_report_with_citations().unwrap_or_default().to_string();
        Ok(PlannerReply::Report(report))
    }

    async fn plan(&self, state: &mut SessionState) -> Result<PlannerReply> {
        self.plan_generator.run(state).await?;
        let plan = state.research_plan().unwrap_or_default().to_string();
        state.push_event(Event::new(Self::NAME, plan.clone()));
        Ok(PlannerReply::Plan(plan))
    }

    async fn decide(&self, state: &SessionState, message: &str) -> Result<PlannerDecision> {
        let preamble = state.render(&TravelPrompts::coordinator())?;
        let turn = self
            .model
            .complete(ModelRequest {
                model: self.coordinator_model.clone(),
                preamble,
                prompt: message.to_string(),
                web_search: false,
            })
            .await?;

        let decision = parse_decision(&turn.text);
        debug!(decision = ?decision, reply = %turn.text.trim(), "Coordinator decided");
        Ok(decision)
    }
}

/// Anything other than an explicit execute reply keeps planning.
fn parse_decision(reply: &str) -> PlannerDecision {
    let first_word = reply
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default();

    if first_word.eq_ignore_ascii_case(EXECUTE_DECISION) {
        PlannerDecision::Execute
    } else {
        PlannerDecision::Plan
    }
}
