//! # Escalation Checker
//!
//! Loop-control stage of the refinement loop. After the evaluator has
//! graded the research, a passing verdict ends the loop; anything else,
//! including no verdict at all, lets it continue.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::grounding::Event;
use crate::pipeline::Stage;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    Escalate,
}

#[derive(Debug, Clone)]
pub struct EscalationChecker {
    name: String,
}

impl EscalationChecker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Read-only check of the stored verdict.
    pub fn check(&self, state: &SessionState) -> LoopSignal {
        match state.research_evaluation() {
            Some(feedback) if feedback.is_pass() => LoopSignal::Escalate,
            _ => LoopSignal::Continue,
        }
    }
}

#[async_trait]
impl Stage for EscalationChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &mut SessionState) -> Result<()> {
        let event = match self.check(state) {
            LoopSignal::Escalate => {
                info!(stage = %self.name, "Research evaluation passed. Escalating to stop loop.");
                Event::escalation(self.name.clone())
            }
            LoopSignal::Continue => {
                info!(stage = %self.name, "Research evaluation failed or not found. Loop will continue.");
                Event::new(self.name.clone(), "")
            }
        };
        state.push_event(event);
        Ok(())
    }

    fn should_stop(&self, state: &SessionState) -> bool {
        self.check(state) == LoopSignal::Escalate
    }
}
