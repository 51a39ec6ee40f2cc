//! # Model Abstraction
//!
//! Every LLM stage talks to its model through `LanguageModel`, so the
//! pipeline can run against Ollama in production and against a scripted
//! double in tests.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::grounding::GroundingMetadata;
use crate::tools::WebSearchTool;

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub preamble: String,
    pub prompt: String,
    /// Attach the `web_search` tool
    pub web_search: bool,
}

/// What one model call produced.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding: None,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn>;
}

/// Ollama models through Rig, with the web search tool on demand.
pub struct OllamaModel {
    temperature: f64,
    max_tool_turns: usize,
    search_tool: WebSearchTool,
}

impl OllamaModel {
    pub fn new(config: &Config) -> Self {
        // Rig's Ollama client reads its base URL from the environment
        std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);

        Self {
            temperature: f64::from(config.temperature),
            max_tool_turns: config.max_tool_turns,
            search_tool: WebSearchTool::new(config.max_search_results),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn> {
        let client = ollama::Client::from_env();
        let log = self.search_tool.log();
        let mark = log.len().await;

        debug!(
            model = %request.model,
            web_search = request.web_search,
            "Calling Ollama"
        );

        let response: std::result::Result<String, _> = if request.web_search {
            let agent = client
                .agent(&request.model)
                .preamble(&request.preamble)
                .temperature(self.temperature)
                .tool(self.search_tool.clone())
                .build();
            agent
                .prompt(request.prompt.as_str())
                .multi_turn(self.max_tool_turns)
                .await
        } else {
            let agent = client
                .agent(&request.model)
                .preamble(&request.preamble)
                .temperature(self.temperature)
                .build();
            agent.prompt(request.prompt.as_str()).await
        };
        let text = response.map_err(|e| AgentError::Model(e.to_string()))?;

        let results = log.take_since(mark).await;
        if !results.is_empty() {
            info!(model = %request.model, results = results.len(), "Turn grounded in web results");
        }

        Ok(ModelTurn {
            text,
            grounding: GroundingMetadata::from_search_results(&results),
        })
    }
}
