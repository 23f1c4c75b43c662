use crate::config::LlmConfig;
use crate::dataset::Dataset;
use crate::llm::{LlmError, TabularAgent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Question-answering collaborator backed by an OpenAI-compatible
/// chat-completions endpoint. Each call is stateless; no conversation memory
/// is kept between prompts.
pub struct OpenAiAgent {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    organization: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiAgent {
    /// Missing credentials are tolerated here so the server can still start
    /// and render the UI; requests fail with a config error instead.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: config.api_key.clone(),
            organization: config.organization.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().ok_or_else(|| {
            LlmError::ConfigError("OPENAI_API_KEY is not configured".to_string())
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn prepare_prompt(&self, dataset: &Dataset, question: &str) -> String {
        format!(
            r#"
### Instructions:
You are a data analyst. Answer the question using only the CSV data below.
Adhere to these rules:
- **Deliberately go through the question and the data word by word** to appropriately answer the question
- Answer with plain text only, no code
- If the data cannot answer the question, say so

### Data (CSV, first row is the header):
{}

### Question:
{}

### Response:
"#,
            dataset.to_csv_text(),
            question
        )
    }
}

#[async_trait]
impl TabularAgent for OpenAiAgent {
    async fn answer(&self, dataset: &Dataset, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key()?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: self.prepare_prompt(dataset, prompt),
            }],
            temperature: self.temperature,
            max_tokens: 2000,
        };

        debug!("Sending question to model {} at {}", self.model, self.endpoint());

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key));

        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        if chat_response.choices.is_empty() {
            return Err(LlmError::ResponseError("No choices in response".to_string()));
        }

        Ok(chat_response.choices[0].message.content.trim().to_string())
    }
}
