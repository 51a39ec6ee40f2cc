//! # Configuration Module
//!
//! Loads LuxMap settings from the environment (and a `.env` file when
//! present): which Ollama models play the worker and critic roles, how hard
//! the research loop may try, and how the deployment is named.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Model for planning, research and search refinement
    pub worker_model: String,

    /// Model for evaluation and report composition
    pub critic_model: String,

    /// Ollama server URL
    pub ollama_host: String,

    /// Sampling temperature for every stage (0.0 - 2.0)
    pub temperature: f32,

    /// Results returned per web search
    pub max_search_results: usize,

    /// Cap on evaluate/refine iterations
    pub max_search_iterations: usize,

    /// Tool round-trips a single stage may make
    pub max_tool_turns: usize,

    /// Deployment name, e.g. "luxmap" or "lux-map-staging"
    pub deployment_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_model: "llama3.2".to_string(),
            critic_model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_search_results: 5,
            max_search_iterations: 5,
            max_tool_turns: 5,
            deployment_name: "luxmap".to_string(),
        }
    }
}

fn parse_var<T>(name: &str, hint: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be {hint}")),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("WORKER_MODEL").or_else(|_| env::var("MODEL")) {
            config.worker_model = val;
        }
        if let Ok(val) = env::var("CRITIC_MODEL") {
            config.critic_model = val;
        }
        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }
        if let Some(val) = parse_var("TEMPERATURE", "a floating-point number (e.g., 0.7)")? {
            config.temperature = val;
        }
        if let Some(val) = parse_var("MAX_SEARCH_RESULTS", "a positive integer")? {
            config.max_search_results = val;
        }
        if let Some(val) = parse_var("MAX_SEARCH_ITERATIONS", "a positive integer")? {
            config.max_search_iterations = val;
        }
        if let Some(val) = parse_var("MAX_TOOL_TURNS", "a positive integer")? {
            config.max_tool_turns = val;
        }
        if let Ok(val) = env::var("AGENT_NAME") {
            config.deployment_name = val;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }
        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }
        if self.max_search_iterations == 0 {
            anyhow::bail!("MAX_SEARCH_ITERATIONS must be at least 1");
        }
        if self.max_tool_turns == 0 {
            anyhow::bail!("MAX_TOOL_TURNS must be at least 1");
        }
        if self.worker_model.is_empty() || self.critic_model.is_empty() {
            anyhow::bail!("Model names cannot be empty");
        }
        if self.deployment_name.is_empty() {
            anyhow::bail!("AGENT_NAME cannot be empty");
        }
        Ok(())
    }

    /// Deployment name as an identifier: dashes become underscores, and a
    /// name not starting with a letter or underscore gets an `agent_` prefix.
    pub fn internal_agent_name(&self) -> String {
        let name = self.deployment_name.replace('-', "_");
        match name.chars().next() {
            Some(c) if c.is_alphabetic() || c == '_' => name,
            _ => format!("agent_{name}"),
        }
    }
}
