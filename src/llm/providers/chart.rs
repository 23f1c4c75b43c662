use crate::config::LlmConfig;
use crate::dataset::Dataset;
use crate::llm::{ChartGenerator, ChartOutput, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Chart-generation collaborator. Asks an OpenAI-compatible chat-completions
/// endpoint for a Vega-Lite figure specification and returns the parsed spec
/// together with the generating source text.
pub struct ChartCodeProvider {
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

impl ChartCodeProvider {
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

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn prepare_prompt(&self, dataset: &Dataset, request: &str) -> String {
        format!(
            r#"
### Instructions:
Your task is to produce a chart for a CSV dataset from a natural-language request.
Adhere to these rules:
- Respond with a single Vega-Lite v5 JSON specification inside a ```json code block
- Inline the data values from the CSV into the specification
- Use the exact column names from the header, they are case sensitive
- Do not include any prose outside the code block

### Data (CSV, first row is the header):
{}

### Request:
{}

### Response:
```json
"#,
            dataset.to_csv_text(),
            request
        )
    }

    /// Pulls the figure specification out of the model response. Falls back
    /// from a ```json block to a bare ``` block to the raw content.
    fn extract_spec(content: &str) -> String {
        if let Some(start) = content.find("```json") {
            if let Some(end) = content.rfind("```") {
                if end > start + 7 {
                    return content[start + 7..end].trim().to_string();
                }
            }
        }

        if let Some(start) = content.find("```") {
            let after = &content[start + 3..];
            if let Some(end) = after.find("```") {
                return after[..end].trim().to_string();
            }
        }

        content.trim().to_string()
    }
}

#[async_trait]
impl ChartGenerator for ChartCodeProvider {
    async fn generate(&self, dataset: &Dataset, prompt: &str) -> Result<ChartOutput, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::ConfigError("OPENAI_API_KEY is not configured".to_string())
        })?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: self.prepare_prompt(dataset, prompt),
            }],
            temperature: self.temperature,
            max_tokens: 2000,
        };

        info!("Requesting chart from model {}", self.model);

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

        let content = &chat_response.choices[0].message.content;
        let code = Self::extract_spec(content);
        debug!("Extracted figure specification ({} bytes)", code.len());

        if code.is_empty() {
            return Err(LlmError::ResponseError(
                "Empty figure specification in response".to_string(),
            ));
        }

        let figure: serde_json::Value = serde_json::from_str(&code).map_err(|e| {
            LlmError::ResponseError(format!("Figure specification is not valid JSON: {}", e))
        })?;

        Ok(ChartOutput { figure, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_code_block() {
        let content = "here you go\n```json\n{\"mark\": \"bar\"}\n```\n";
        assert_eq!(
            ChartCodeProvider::extract_spec(content),
            "{\"mark\": \"bar\"}"
        );
    }

    #[test]
    fn extracts_plain_code_block() {
        let content = "```\n{\"mark\": \"line\"}\n```";
        assert_eq!(
            ChartCodeProvider::extract_spec(content),
            "{\"mark\": \"line\"}"
        );
    }

    #[test]
    fn falls_back_to_raw_content() {
        assert_eq!(
            ChartCodeProvider::extract_spec("{\"mark\": \"point\"}"),
            "{\"mark\": \"point\"}"
        );
    }
}
