//! # Pipeline Module
//!
//! The small orchestration substrate the agents run on: a `Stage` reads and
//! writes the session state, `Sequential` runs stages in order, and
//! `RefinementLoop` repeats its stages until one of them asks to stop or the
//! iteration cap is reached.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::state::SessionState;

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: &mut SessionState) -> Result<()>;

    /// Checked right after `run` when the stage sits inside a loop.
    fn should_stop(&self, _state: &SessionState) -> bool {
        false
    }
}

pub struct Sequential {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Sequential {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl Stage for Sequential {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &mut SessionState) -> Result<()> {
        for stage in &self.stages {
            debug!(pipeline = %self.name, stage = %stage.name(), "Running stage");
            stage.run(state).await?;
        }
        Ok(())
    }
}

pub struct RefinementLoop {
    name: String,
    max_iterations: usize,
    stages: Vec<Box<dyn Stage>>,
}

impl RefinementLoop {
    pub fn new(name: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            max_iterations,
            stages: Vec::new(),
        }
    }

    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

#[async_trait]
impl Stage for RefinementLoop {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &mut SessionState) -> Result<()> {
        for iteration in 1..=self.max_iterations {
            debug!(name = %self.name, iteration, "Loop iteration");
            for stage in &self.stages {
                stage.run(state).await?;
                if stage.should_stop(state) {
                    info!(
                        name = %self.name,
                        stage = %stage.name(),
                        iteration,
                        "Loop stopped by stage"
                    );
                    return Ok(());
                }
            }
        }

        info!(
            name = %self.name,
            max_iterations = self.max_iterations,
            "Loop reached its iteration limit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::Event;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Appends an event; asks to stop once `stop_after` events exist.
    struct Recorder {
        name: String,
        calls: Arc<AtomicUsize>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn new(name: &str, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                calls,
                stop_after: None,
            }
        }
    }

    #[async_trait]
    impl Stage for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, state: &mut SessionState) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            state.push_event(Event::new(self.name.clone(), ""));
            Ok(())
        }

        fn should_stop(&self, state: &SessionState) -> bool {
            self.stop_after.is_some_and(|n| state.events().len() >= n)
        }
    }

    #[tokio::test]
    async fn test_sequential_runs_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Sequential::new("p")
            .then(Recorder::new("a", calls.clone()))
            .then(Recorder::new("b", calls.clone()));

        let mut state = SessionState::new();
        pipeline.run(&mut state).await.unwrap();

        let authors: Vec<_> = state.events().iter().map(|e| e.author.as_str()).collect();
        assert_eq!(authors, vec!["a", "b"]);
        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_loop_honours_iteration_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refinement = RefinementLoop::new("l", 3).then(Recorder::new("a", calls.clone()));
        assert_eq!(refinement.max_iterations(), 3);

        let mut state = SessionState::new();
        refinement.run(&mut state).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), refinement.max_iterations());
    }

    #[tokio::test]
    async fn test_loop_stops_when_stage_asks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut checker = Recorder::new("check", calls.clone());
        checker.stop_after = Some(4);
        let after = Arc::new(AtomicUsize::new(0));

        let refinement = RefinementLoop::new("l", 10)
            .then(Recorder::new("work", calls.clone()))
            .then(checker)
            .then(Recorder::new("after", after.clone()));

        let mut state = SessionState::new();
        refinement.run(&mut state).await.unwrap();

        // work, check, after, work, check(stop)
        assert_eq!(state.events().len(), 5);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }
}
