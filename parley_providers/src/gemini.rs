use async_trait::async_trait;
use parley_core::{BackendError, Completion, CompletionBackend, ConversationTurn, GenerationConfig};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini `generateContent` endpoint.
///
/// Every call sends the full prior history, so the API's own chat sessions
/// are never used.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        info!("Creating GeminiBackend for model {model}");
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, request: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Upstream(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Upstream(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Upstream(format!(
                "HTTP {status}: {}",
                upstream_error_message(&body)
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| BackendError::Upstream(format!("Invalid response body: {e}")))
    }
}

/// Build a `generateContent` request body from history plus the new query.
fn build_request(
    prior_turns: &[ConversationTurn],
    query: &str,
    config: &GenerationConfig,
) -> Value {
    let mut contents: Vec<Value> = prior_turns
        .iter()
        .map(|turn| json!({ "role": turn.role.as_str(), "parts": [{ "text": turn.text }] }))
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": query }] }));

    let mut request = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": config.temperature,
            "topP": config.top_p,
            "topK": config.top_k,
            "maxOutputTokens": config.max_output_tokens,
        },
    });

    if !config.system_instruction.trim().is_empty() {
        request["systemInstruction"] = json!({ "parts": [{ "text": config.system_instruction }] });
    }

    request
}

/// Classify the first part of the first candidate.
fn parse_response(response: &Value) -> Completion {
    let Some(candidate) = response["candidates"].get(0) else {
        let kind = response["promptFeedback"]["blockReason"]
            .as_str()
            .map_or_else(|| "no candidates".to_string(), |r| format!("blocked: {r}"));
        return Completion::Other { kind };
    };

    let Some(part) = candidate["content"]["parts"].get(0) else {
        let kind = candidate["finishReason"]
            .as_str()
            .map_or_else(|| "no parts".to_string(), |r| format!("finished: {r}"));
        return Completion::Other { kind };
    };

    if let Some(text) = part["text"].as_str() {
        return Completion::Text(text.to_string());
    }

    let kind = part
        .as_object()
        .and_then(|fields| fields.keys().next().cloned())
        .unwrap_or_else(|| "unknown part".to_string());
    Completion::Other { kind }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn generate(
        &self,
        prior_turns: &[ConversationTurn],
        query: &str,
        config: &GenerationConfig,
    ) -> Result<Completion, BackendError> {
        let request = build_request(prior_turns, query, config);

        info!(
            "Sending request to Gemini API: model={}, prior_turns={}",
            self.model,
            prior_turns.len()
        );

        let response = self.send(&request).await?;
        let completion = parse_response(&response);

        debug!("Received completion from Gemini API: {completion:?}");
        Ok(completion)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
