//! Candidate synthesis through an OpenAI-compatible chat completion API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CandidateSource;
use super::parser::extract_json_object;
use crate::error::CandidateError;
use crate::http_client::build_http_client;
use crate::node::NodeCatalog;

pub const DEFAULT_SYNTHESIS_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYNTHESIS_MODEL: &str = "gpt-4o-mini";

pub struct ChatCompletionSource {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    system_prompt: String,
}

impl ChatCompletionSource {
    pub fn new(catalog: &NodeCatalog) -> Self {
        Self {
            client: build_http_client(Some(Duration::from_secs(60))),
            api_key: None,
            model: DEFAULT_SYNTHESIS_MODEL.to_string(),
            base_url: DEFAULT_SYNTHESIS_BASE_URL.to_string(),
            system_prompt: system_prompt(catalog),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl CandidateSource for ChatCompletionSource {
    fn name(&self) -> &str {
        "synthesis"
    }

    async fn request_candidate(&self, intent: &str) -> Result<String, CandidateError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: intent,
                },
            ],
            temperature: 0.0,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = %self.model, "Synthesis request failed");
            return Err(CandidateError::Source(format!(
                "Synthesis service returned {}: {}",
                status.as_u16(),
                text
            )));
        }

        let data: ChatResponse = response.json().await?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CandidateError::Source("Synthesis reply was empty".to_string()))?;

        debug!(chars = content.len(), "Received synthesis reply");
        extract_json_object(&content)
            .map(str::to_string)
            .ok_or_else(|| {
                CandidateError::Unparseable("Synthesis reply contained no JSON object".to_string())
            })
    }
}

fn system_prompt(catalog: &NodeCatalog) -> String {
    let mut prompt = String::from(
        "You design n8n workflows. Reply with a single JSON object of the form \
         {\"nodes\": [{\"id\", \"type\", \"parameters\"}], \"connections\": \
         [{\"fromNodeId\", \"fromPort\", \"toNodeId\", \"toPort\"}]}. \
         Start with exactly one trigger node. Use only these node types:\n",
    );
    for spec in catalog.specs() {
        let required: Vec<&str> = spec.required_params.iter().map(|p| p.name.as_str()).collect();
        prompt.push_str(&format!(
            "- {} (inputs: {}, outputs: {}, required: [{}])\n",
            spec.type_id,
            spec.input_ports,
            spec.output_ports,
            required.join(", ")
        ));
    }
    prompt
}
