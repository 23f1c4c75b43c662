pub mod providers;

use crate::dataset::Dataset;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A renderable figure plus the source code that generated it.
#[derive(Debug, Clone)]
pub struct ChartOutput {
    pub figure: serde_json::Value,
    pub code: String,
}

/// Chart-generation collaborator: turns a dataset and a natural-language
/// request into a figure and its generating code. Opaque capability; the
/// dispatcher never looks inside.
#[async_trait]
pub trait ChartGenerator: Send + Sync {
    async fn generate(&self, dataset: &Dataset, prompt: &str) -> Result<ChartOutput, LlmError>;
}

/// Question-answering collaborator: answers a free-text question about a
/// dataset with plain text.
#[async_trait]
pub trait TabularAgent: Send + Sync {
    async fn answer(&self, dataset: &Dataset, prompt: &str) -> Result<String, LlmError>;
}
