use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Result, ShopVisionError};
use crate::media::SourceImage;

/// Env vars consulted, in order, when no key was configured explicitly.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// A single `generateContent` round trip. The Gemini client is the production
/// implementation; tests substitute recorders.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 {
                            let head: String = s.chars().take(50).collect();
                            *val = Value::String(format!("{}...[truncated {} chars]", head, s.len() - head.len()));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut value = value.clone();
    truncate_base64_in_json(&mut value);
    value.to_string()
}

/// Picks the explicit key, else the first non-empty env var from [`API_KEY_VARS`].
pub fn resolve_api_key(explicit: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    explicit
        .map(str::to_string)
        .into_iter()
        .chain(API_KEY_VARS.iter().filter_map(|name| lookup(*name)))
        .find(|k| !k.trim().is_empty())
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: None,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base.clone())
    }

    /// Pins a key instead of reading the environment on each call.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let api_key = resolve_api_key(self.api_key.as_deref(), |name| std::env::var(name).ok())
            .ok_or_else(|| ShopVisionError::Service(format!("no API key: set {}", API_KEY_VARS.join(" or "))))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        info!("🔗 Making request to: {}", url);

        let request_body = serde_json::to_value(request).map_err(|e| ShopVisionError::Service(e.to_string()))?;
        debug!("📤 Request body: {}", loggable(&request_body));

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(ShopVisionError::Service(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await?;
        let raw: Value = serde_json::from_str(&response_text)
            .map_err(|e| ShopVisionError::Service(format!("unreadable response envelope: {}", e)))?;
        debug!("📥 Raw Gemini API response: {}", loggable(&raw));

        let parsed: GenerateContentResponse = serde_json::from_value(raw)
            .map_err(|e| ShopVisionError::Service(format!("unreadable response envelope: {}", e)))?;

        if let Some(reason) = parsed.block_reason() {
            error!("❌ Prompt blocked by Gemini: {}", reason);
            return Err(ShopVisionError::Service(format!("prompt blocked: {}", reason)));
        }
        Ok(parsed)
    }
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// One user turn: the image first, then the instruction text.
    pub fn image_and_text(image: &SourceImage, text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content { parts: vec![Part::inline_image(image), Part::text(text)] }],
            generation_config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Text parts across all contents, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.contents.iter().flat_map(|c| &c.parts).filter_map(|p| p.text.as_deref()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), inline_data: None }
    }

    pub fn inline_image(image: &SourceImage) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: image.mime_type().to_string(), data: image.to_base64() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate; later candidates are never consulted.
    pub fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text of the first candidate, `None` when it has no text parts.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts().iter().filter_map(|p| p.text.as_deref()).collect();
        (!texts.is_empty()).then(|| texts.concat())
    }

    pub fn block_reason(&self) -> Option<String> {
        let feedback = self.prompt_feedback.as_ref()?;
        let reason = feedback.block_reason.as_ref()?;
        Some(feedback.block_reason_message.clone().unwrap_or_else(|| reason.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::PNG;
    use axum::{extract::State, http::{HeaderMap, StatusCode, Uri}, Json, Router};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Recorded {
        path: String,
        api_key: Option<String>,
        body: Value,
    }

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<Recorded>>>,
    }

    async fn stub_handler(State(stub): State<Stub>, uri: Uri, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        stub.seen.lock().push(Recorded {
            path: uri.path().to_string(),
            api_key: headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()).map(str::to_string),
            body,
        });
        (stub.status, Json(stub.reply.clone()))
    }

    async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Recorded>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(stub_handler)
            .with_state(Stub { status, reply, seen: seen.clone() });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1beta", addr), seen)
    }

    fn png() -> SourceImage {
        SourceImage::new(PNG.to_vec(), "image/png").unwrap()
    }

    #[tokio::test]
    async fn test_posts_to_model_endpoint_with_key_header() {
        let reply = json!({ "candidates": [{ "content": { "parts": [{ "text": "hello" }] }, "finishReason": "STOP" }] });
        let (base, seen) = spawn_stub(StatusCode::OK, reply).await;
        let client = GeminiClient::new(base).with_api_key("test-key");

        let request = GenerateContentRequest::image_and_text(&png(), "describe");
        let response = client.generate_content("gemini-test", &request).await.unwrap();
        assert_eq!(response.text().as_deref(), Some("hello"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
        let parts = &seen[0].body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], png().to_base64());
        assert_eq!(parts[1]["text"], "describe");
    }

    #[tokio::test]
    async fn test_error_status_is_service_error() {
        let (base, _) = spawn_stub(StatusCode::FORBIDDEN, json!({ "error": { "message": "API key not valid" } })).await;
        let client = GeminiClient::new(base).with_api_key("bad");
        let err = client
            .generate_content("gemini-test", &GenerateContentRequest::image_and_text(&png(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopVisionError::Service(ref m) if m.contains("403") && m.contains("API key not valid")));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_service_error() {
        let reply = json!({ "candidates": [], "promptFeedback": { "blockReason": "SAFETY" } });
        let (base, _) = spawn_stub(StatusCode::OK, reply).await;
        let client = GeminiClient::new(base).with_api_key("k");
        let err = client
            .generate_content("gemini-test", &GenerateContentRequest::image_and_text(&png(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopVisionError::Service(ref m) if m.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_service_error() {
        let client = GeminiClient::new("http://127.0.0.1:1/v1beta").with_api_key("k");
        let err = client
            .generate_content("gemini-test", &GenerateContentRequest::image_and_text(&png(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopVisionError::Service(_)));
    }

    #[test]
    fn test_resolve_api_key_order() {
        let env = |name: &str| match name {
            "GEMINI_API_KEY" => Some(String::new()),
            "API_KEY" => Some("from-api-key".to_string()),
            _ => None,
        };
        assert_eq!(resolve_api_key(Some("explicit"), env).as_deref(), Some("explicit"));
        assert_eq!(resolve_api_key(None, env).as_deref(), Some("from-api-key"));
        assert_eq!(resolve_api_key(None, |_| None), None);
    }

    #[test]
    fn test_truncates_inline_data_for_logs() {
        let long = "A".repeat(500);
        let logged = loggable(&json!({ "parts": [{ "inlineData": { "data": long } }] }));
        assert!(logged.contains("[truncated 450 chars]"));
        assert!(logged.len() < 200);
    }

    #[test]
    fn test_text_concatenates_first_candidate_only() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"a\":" }, { "inlineData": { "mimeType": "image/png", "data": "AA==" } }, { "text": "1}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("{\"a\":1}"));
        assert_eq!(resp.parts().len(), 3);

        let empty = GenerateContentResponse::default();
        assert!(empty.parts().is_empty());
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let request = GenerateContentRequest::image_and_text(&png(), "x").with_config(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            ..Default::default()
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert!(json["generationConfig"].get("responseSchema").is_none());
        assert!(json.get("generation_config").is_none());
    }
}
