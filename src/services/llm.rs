use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

use crate::core::config::Config;
use crate::services::schema::ResponseSchema;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String, // "gemini", "ollama" or "openai"
    #[serde(default)]
    pub gemini: GeminiConfig,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini: GeminiConfig::default(),
            ollama: None,
            openai: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    pub model: String,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_ollama_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

/// One structured-output request: what to do, who to be, and what JSON to return.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub instruction: String,
    pub system: String,
    pub schema: ResponseSchema,
}

/// A model backend able to produce JSON text following a declared schema.
///
/// Implementations return the raw model text, which may be empty; validation is
/// the caller's job.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, credential: &str, request: &GenerateRequest) -> Result<String>;
}

pub fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = &config.llm.gemini;
            Ok(Arc::new(GeminiClient::new(&cfg.base_url, &cfg.model)))
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Ok(Arc::new(OllamaClient::new(&cfg.base_url, &cfg.model)))
        }
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            Ok(Arc::new(OpenAIClient::new(&cfg.model, cfg.base_url.as_deref())))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, credential: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        ))
        .context("Invalid Gemini base_url")?;
        url.query_pairs_mut().append_pair("key", credential);
        Ok(url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiSystemInstruction,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

impl GeminiRequest {
    fn from_request(request: &GenerateRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.instruction.clone(),
                }],
            }],
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: request.system.clone(),
                }],
            },
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.schema.to_gemini(),
            },
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    /// Concatenated candidate text; empty when the model produced none (e.g. safety block).
    fn into_text(self) -> Result<String> {
        if let Some(err) = self.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        let Some(first) = self.candidates.and_then(|c| c.into_iter().next()) else {
            return Ok(String::new());
        };

        let text: String = first
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
            log::warn!("Gemini response empty. Finish reason: {}", reason);
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, credential: &str, request: &GenerateRequest) -> Result<String> {
        let url = self.endpoint(credential)?;
        let body = GeminiRequest::from_request(request);

        // without_url keeps the key query parameter out of error messages
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.map_err(|e| e.without_url())?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let response_text = resp.text().await.map_err(|e| e.without_url())?;
        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text)
        })?;

        result.into_text()
    }
}

// --- Ollama ---
#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn pair(request: &GenerateRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.instruction.clone(),
            },
        ]
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, _credential: &str, request: &GenerateRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(request),
            stream: false,
            format: request.schema.json_schema().clone(),
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

// --- OpenAI ---

const WRAPPED_ROOT: &str = "items";

#[derive(Debug)]
struct OpenAIClient {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(model: &str, base_url: Option<&str>) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: Value,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

/// Structured outputs require an object at the root, so other shapes are wrapped
/// in a single `items` field. Returns the response format and whether it wrapped.
fn openai_response_format(schema: &ResponseSchema) -> (Value, bool) {
    let (root, wrapped) = if schema.is_object() {
        (schema.to_strict(), false)
    } else {
        (
            json!({
                "type": "object",
                "properties": { WRAPPED_ROOT: schema.to_strict() },
                "required": [WRAPPED_ROOT],
                "additionalProperties": false,
            }),
            true,
        )
    };
    let format = json!({
        "type": "json_schema",
        "json_schema": { "name": "response", "strict": true, "schema": root },
    });
    (format, wrapped)
}

/// Content without the wrapper is passed through untouched, so response validation
/// reports it like any other malformed reply.
fn unwrap_root(content: &str) -> String {
    serde_json::from_str::<Value>(content)
        .ok()
        .and_then(|mut value| value.get_mut(WRAPPED_ROOT).map(Value::take))
        .map(|inner| inner.to_string())
        .unwrap_or_else(|| {
            log::warn!("OpenAI structured output is missing `{}`", WRAPPED_ROOT);
            content.to_string()
        })
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, credential: &str, request: &GenerateRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let (response_format, wrapped) = openai_response_format(&request.schema);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(request),
            response_format,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", credential))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if wrapped && !content.trim().is_empty() {
            return Ok(unwrap_root(&content));
        }
        Ok(content)
    }
}
