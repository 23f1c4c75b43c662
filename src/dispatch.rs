use serde::Serialize;
use std::error::Error;
use std::fmt;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::dataset::Dataset;
use crate::llm::providers::chart::ChartCodeProvider;
use crate::llm::providers::openai::OpenAiAgent;
use crate::llm::{ChartGenerator, LlmError, TabularAgent};

/// Prompts containing any of these (lower-cased, substring match) are treated
/// as chart requests. Deliberately a dumb keyword test, not NLP; it can
/// misfire on prompts that mention charts without wanting one, and that is
/// accepted behavior.
const VISUALIZATION_KEYWORDS: [&str; 3] = ["visualize", "visualization", "chart"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Visualization,
    QuestionAnswering,
}

pub fn classify(prompt: &str) -> QueryKind {
    let lowered = prompt.to_lowercase();
    if VISUALIZATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        QueryKind::Visualization
    } else {
        QueryKind::QuestionAnswering
    }
}

/// Display-ready outcome of one dispatched prompt. Produced fresh per prompt,
/// never cached.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Chart {
        figure: serde_json::Value,
        code: String,
    },
    TextAnswer {
        answer: String,
    },
}

#[derive(Debug)]
pub enum DispatchError {
    GenerationFailure(LlmError),
    AgentFailure(LlmError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::GenerationFailure(err) => {
                write!(f, "Chart generation failed: {}", err)
            }
            DispatchError::AgentFailure(err) => write!(f, "Agent request failed: {}", err),
        }
    }
}

impl Error for DispatchError {}

/// Routes a prompt to the chart generator or the question-answering agent.
///
/// Stateless across calls: a retry prompt shares nothing with the prompt
/// before it except the dataset. Collaborator failures propagate untouched,
/// there is no local recovery or retry.
pub struct QueryDispatcher {
    chart: Box<dyn ChartGenerator>,
    agent: Box<dyn TabularAgent>,
}

impl QueryDispatcher {
    pub fn new(chart: Box<dyn ChartGenerator>, agent: Box<dyn TabularAgent>) -> Self {
        Self { chart, agent }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self::new(
            Box::new(ChartCodeProvider::new(config)?),
            Box::new(OpenAiAgent::new(config)?),
        ))
    }

    pub async fn dispatch(
        &self,
        dataset: &Dataset,
        prompt: &str,
    ) -> Result<QueryResult, DispatchError> {
        match classify(prompt) {
            QueryKind::Visualization => {
                info!("Dispatching visualization request");
                let output = self
                    .chart
                    .generate(dataset, prompt)
                    .await
                    .map_err(DispatchError::GenerationFailure)?;
                debug!("Chart generated ({} bytes of code)", output.code.len());
                Ok(QueryResult::Chart {
                    figure: output.figure,
                    code: output.code,
                })
            }
            QueryKind::QuestionAnswering => {
                info!("Dispatching question-answering request");
                let answer = self
                    .agent
                    .answer(dataset, prompt)
                    .await
                    .map_err(DispatchError::AgentFailure)?;
                Ok(QueryResult::TextAnswer { answer })
            }
        }
    }
}
