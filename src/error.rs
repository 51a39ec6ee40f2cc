//! # Error Types
//!
//! Library-level errors for the LuxMap pipeline. Partial or malformed
//! grounding data and unresolvable citations never surface here: those
//! degrade to best-effort output instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Prompt references missing state key: {key}")]
    MissingState { key: String },

    #[error("Evaluator output is not a valid verdict: {0}")]
    InvalidEvaluation(String),

    #[error("Session file error: {0}")]
    Session(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
