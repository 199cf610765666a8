use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::AppConfig;
use crate::encoder::TransportPayload;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider returned no text: {0}")]
    EmptyResponse(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(payload: &TransportPayload) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: payload.mime_type.as_mime().to_string(),
                data: payload.data.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(self) -> Result<String, ProviderError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ProviderError::EmptyResponse(
                block_reason.unwrap_or_else(|| "no candidates".to_string()),
            ));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse(
                candidate
                    .finish_reason
                    .unwrap_or_else(|| "empty candidate".to_string()),
            ));
        }
        Ok(text)
    }
}

/// Outbound seam to the multimodal model. Returns the model's raw text.
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, ProviderError>;

    fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    base_url: Url,
}

impl GeminiProvider {
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    pub fn endpoint(&self) -> Result<Url, ProviderError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{}/models/{}:generateContent", base, self.model))?;
        Ok(url)
    }
}

#[async_trait]
impl ClassificationProvider for GeminiProvider {
    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, ProviderError> {
        let url = self.endpoint()?;
        log::debug!("Sending generateContent request to {}", url);

        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        parsed.text()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassificationClient, FAILURE_MESSAGE, FailureKind};
    use crate::encoder::encode_bytes;
    use actix_web::dev::ServerHandle;
    use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
    use serde_json::json;
    use shared::ImageMimeType;
    use std::sync::Arc;
    use std::time::Duration;

    fn provider(base: &str) -> GeminiProvider {
        let mut config = AppConfig::new("test-key").unwrap();
        config.base_url = Url::parse(base).unwrap();
        GeminiProvider::new(&config).unwrap()
    }

    #[test]
    fn endpoint_includes_model() {
        let p = provider("https://generativelanguage.googleapis.com/v1beta/");
        assert_eq!(
            p.endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(p.model(), "gemini-2.5-flash");
    }

    #[test]
    fn image_part_serializes_as_inline_data() {
        let payload = encode_bytes(b"abc", ImageMimeType::Webp);
        let value = serde_json::to_value(Part::image(&payload)).unwrap();
        assert_eq!(
            value,
            json!({ "inlineData": { "mimeType": "image/webp", "data": "YWJj" } })
        );
    }

    #[test]
    fn response_text_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }], "role": "model" },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "totalTokenCount": 42 }
        });
        let parsed: GenerateContentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let parsed: GenerateContentResponse = serde_json::from_value(body).unwrap();
        match parsed.text() {
            Err(ProviderError::EmptyResponse(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn candidate_without_text_is_empty_response() {
        let body = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        let parsed: GenerateContentResponse = serde_json::from_value(body).unwrap();
        match parsed.text() {
            Err(ProviderError::EmptyResponse(reason)) => assert_eq!(reason, "MAX_TOKENS"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    async fn fake_gemini(req: HttpRequest, path: web::Path<String>, body: web::Json<Value>) -> HttpResponse {
        let call = path.into_inner();
        if call.starts_with("limited-model") {
            return HttpResponse::TooManyRequests().body("quota");
        }
        if call.starts_with("slow-model") {
            actix_web::rt::time::sleep(Duration::from_secs(3)).await;
        }

        let key = req
            .headers()
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let body = body.into_inner();
        let mime = body["generationConfig"]["responseMimeType"]
            .as_str()
            .unwrap_or_default();
        HttpResponse::Ok().json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": format!("{}|{}", key, mime) }], "role": "model" },
                "finishReason": "STOP"
            }]
        }))
    }

    fn start_fake_gemini() -> (String, ServerHandle) {
        let server = HttpServer::new(|| {
            App::new().route("/v1beta/models/{call}", web::post().to(fake_gemini))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}/v1beta", addr), handle)
    }

    fn local_provider(base: &str, model: &str, timeout: Option<Duration>) -> GeminiProvider {
        let mut config = AppConfig::new("local-key").unwrap();
        config.base_url = Url::parse(base).unwrap();
        config.model = model.to_string();
        config.request_timeout = timeout;
        GeminiProvider::new(&config).unwrap()
    }

    fn leaf_request() -> GenerateContentRequest {
        ClassificationClient::build_request(&encode_bytes(b"leaf", ImageMimeType::Png))
    }

    #[actix_web::test]
    async fn sends_api_key_and_decodes_candidate_text() {
        let (base, server) = start_fake_gemini();
        let p = local_provider(&base, "ok-model", None);

        let text = p.generate(&leaf_request()).await.unwrap();
        assert_eq!(text, "local-key|application/json");
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn non_success_status_is_server_error() {
        let (base, server) = start_fake_gemini();
        let p = local_provider(&base, "limited-model", None);

        match p.generate(&leaf_request()).await {
            Err(ProviderError::Server { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota");
            }
            other => panic!("unexpected: {:?}", other),
        }
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn slow_provider_hits_request_timeout() {
        let (base, server) = start_fake_gemini();
        let p = local_provider(&base, "slow-model", Some(Duration::from_secs(1)));

        let err = p.generate(&leaf_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "{:?}", err);

        let client = ClassificationClient::new(Arc::new(p));
        let failure = client
            .classify(&encode_bytes(b"leaf", ImageMimeType::Png))
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Transport);
        assert_eq!(failure.to_string(), FAILURE_MESSAGE);
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn refused_connection_is_http_error() {
        let p = provider("http://127.0.0.1:1/v1beta");
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text("hello")],
            }],
            system_instruction: Content {
                parts: vec![Part::text("system")],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
                response_schema: json!({}),
            },
        };
        let err = p.generate(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }
}
