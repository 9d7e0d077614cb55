use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use careline_core::coerce::clip;
use careline_core::error::{FailureKind, GatewayFailure};
use careline_core::prompt::PromptPayload;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GeminiConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATION_TEMPERATURE: f32 = 0.4;
const GENERATION_MAX_TOKENS: u32 = 1024;
const PROBE_PROMPT: &str = "Reply with the single word OK.";
const PROBE_MAX_TOKENS: u32 = 8;
const MAX_ERROR_CHARS: usize = 500;

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of the connectivity probe. Never an error: failures are reported
/// through `success` and `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub message: String,
}

/// The generative backend as seen by the request handlers.
///
/// One outbound call per invocation, no retries. A timeout is the only
/// cancellation mechanism.
pub trait ModelBackend: Send + Sync {
    fn model(&self) -> &str;
    fn api_version(&self) -> &str;

    /// Send the prompt and return the backend's raw text output.
    fn generate<'a>(
        &'a self,
        prompt: &'a PromptPayload,
    ) -> BackendFuture<'a, Result<String, GatewayFailure>>;

    /// Minimal call answering "is the backend reachable".
    fn probe(&self) -> BackendFuture<'_, ProbeOutcome>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl ErrorBody {
    fn describe(&self) -> String {
        match &self.status {
            Some(status) => format!("{status}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated. Empty when the
    /// backend produced no candidate text.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Human-readable error from a non-success response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.describe(),
        Err(_) if body.trim().is_empty() => "empty error response".to_string(),
        Err(_) => clip(body.trim(), MAX_ERROR_CHARS),
    }
}

fn transport_failure(err: reqwest::Error) -> GatewayFailure {
    if err.is_timeout() {
        GatewayFailure::timeout(format!("request to generative backend timed out: {err}"))
    } else {
        GatewayFailure::classified(
            err.status().map(|status| status.as_u16()),
            format!("request to generative backend failed: {err}"),
        )
    }
}

/// Gemini `generateContent` client.
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.config.base_url.as_str().trim_end_matches('/'),
            self.config.api_version,
            self.config.model
        )
    }

    async fn call(&self, text: &str, max_output_tokens: u32) -> Result<String, GatewayFailure> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(GatewayFailure::classified(
                None,
                "GEMINI_API_KEY is not configured",
            ));
        };

        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text }],
            }],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
                max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let payload = response.text().await.map_err(transport_failure)?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                model = %self.config.model,
                "Generative backend returned non-success status"
            );
            return Err(GatewayFailure::classified(
                Some(status.as_u16()),
                error_message(&payload),
            ));
        }

        let envelope: GenerateContentResponse =
            serde_json::from_str(&payload).map_err(|e| GatewayFailure {
                kind: FailureKind::UpstreamError,
                status: Some(status.as_u16()),
                message: format!("malformed backend response envelope: {e}"),
            })?;

        if let Some(error) = &envelope.error {
            return Err(GatewayFailure::classified(
                error.code.or(Some(status.as_u16())),
                error.describe(),
            ));
        }

        Ok(envelope.into_text())
    }
}

impl ModelBackend for GeminiGateway {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn api_version(&self) -> &str {
        &self.config.api_version
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a PromptPayload,
    ) -> BackendFuture<'a, Result<String, GatewayFailure>> {
        Box::pin(self.call(prompt.text(), GENERATION_MAX_TOKENS))
    }

    fn probe(&self) -> BackendFuture<'_, ProbeOutcome> {
        Box::pin(async move {
            match self.call(PROBE_PROMPT, PROBE_MAX_TOKENS).await {
                Ok(_) => ProbeOutcome {
                    success: true,
                    message: "Gemini API connection successful".to_string(),
                },
                Err(failure) => ProbeOutcome {
                    success: false,
                    message: failure.message,
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::{Json, Router};
    use careline_core::context::ClinicalContext;
    use careline_core::prompt::build_prompt;
    use serde_json::{Value, json};
    use url::Url;

    use super::*;

    #[derive(Default)]
    struct Captured {
        path: Option<String>,
        api_key: Option<String>,
        body: Option<Value>,
    }

    async fn spawn_backend(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("mock backend should serve");
        });
        Url::parse(&format!("http://{addr}")).expect("mock url should parse")
    }

    fn gateway(base_url: Url, timeout: Duration) -> GeminiGateway {
        GeminiGateway::new(GeminiConfig {
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            api_version: "v1beta".to_string(),
            base_url,
            timeout,
        })
        .expect("gateway should build")
    }

    fn prompt() -> PromptPayload {
        build_prompt(&ClinicalContext::default(), "Is walking good for back pain?")
            .expect("prompt should build")
    }

    fn respond_with(status: StatusCode, body: Value) -> Router {
        Router::new().fallback(move || {
            let body = body.clone();
            async move { (status, Json(body)).into_response() }
        })
    }

    #[tokio::test]
    async fn generate_posts_prompt_and_returns_candidate_text() {
        async fn handler(
            State(captured): State<Arc<Mutex<Captured>>>,
            uri: Uri,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let mut guard = captured.lock().expect("capture lock");
            guard.path = Some(uri.path().to_string());
            guard.api_key = headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            guard.body = Some(body);
            Json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"answer\":"}, {"text": " \"Yes.\"}"}]}}]
            }))
        }

        let captured = Arc::new(Mutex::new(Captured::default()));
        let base = spawn_backend(Router::new().fallback(handler).with_state(captured.clone())).await;
        let prompt = prompt();

        let text = gateway(base, Duration::from_secs(5))
            .generate(&prompt)
            .await
            .expect("generate should succeed");
        assert_eq!(text, "{\"answer\": \"Yes.\"}");

        let guard = captured.lock().expect("capture lock");
        assert_eq!(
            guard.path.as_deref(),
            Some("/v1beta/models/test-model:generateContent")
        );
        assert_eq!(guard.api_key.as_deref(), Some("test-key"));
        let body = guard.body.as_ref().expect("body captured");
        assert_eq!(body["contents"][0]["parts"][0]["text"], prompt.text());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], GENERATION_MAX_TOKENS);
    }

    #[tokio::test]
    async fn http_429_is_rate_limited() {
        let base = spawn_backend(respond_with(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
        ))
        .await;

        let failure = gateway(base, Duration::from_secs(5))
            .generate(&prompt())
            .await
            .expect_err("429 must fail");
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.status, Some(429));
        assert!(failure.message.contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn quota_message_on_other_status_is_rate_limited() {
        let base = spawn_backend(respond_with(
            StatusCode::FORBIDDEN,
            json!({"error": {"code": 403, "message": "Quota exceeded for this project"}}),
        ))
        .await;

        let failure = gateway(base, Duration::from_secs(5))
            .generate(&prompt())
            .await
            .expect_err("quota error must fail");
        assert_eq!(failure.kind, FailureKind::RateLimited);
    }

    #[tokio::test]
    async fn server_error_is_upstream_error() {
        let base = spawn_backend(respond_with(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"code": 500, "message": "Internal error encountered.", "status": "INTERNAL"}}),
        ))
        .await;

        let failure = gateway(base, Duration::from_secs(5))
            .generate(&prompt())
            .await
            .expect_err("500 must fail");
        assert_eq!(failure.kind, FailureKind::UpstreamError);
        assert_eq!(failure.status, Some(500));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let router = Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"candidates": []}))
        });
        let base = spawn_backend(router).await;

        let failure = gateway(base, Duration::from_millis(100))
            .generate(&prompt())
            .await
            .expect_err("slow backend must time out");
        assert_eq!(failure.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn empty_candidates_return_empty_text() {
        let base = spawn_backend(respond_with(StatusCode::OK, json!({"candidates": []}))).await;
        let text = gateway(base, Duration::from_secs(5))
            .generate(&prompt())
            .await
            .expect("envelope without candidates is still a response");
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let mut config = gateway(
            Url::parse("http://127.0.0.1:9").expect("url"),
            Duration::from_secs(1),
        )
        .config;
        config.api_key = None;
        let gateway = GeminiGateway::new(config).expect("gateway should build");

        let failure = gateway
            .generate(&prompt())
            .await
            .expect_err("missing key must fail");
        assert_eq!(failure.kind, FailureKind::UpstreamError);
        let outcome = gateway.probe().await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn probe_reports_success_and_failure() {
        let ok = spawn_backend(respond_with(
            StatusCode::OK,
            json!({"candidates": [{"content": {"parts": [{"text": "OK"}]}}]}),
        ))
        .await;
        let outcome = gateway(ok, Duration::from_secs(5)).probe().await;
        assert!(outcome.success);

        let down = spawn_backend(respond_with(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"message": "The model is overloaded."}}),
        ))
        .await;
        let outcome = gateway(down, Duration::from_secs(5)).probe().await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "The model is overloaded.");
    }

    #[test]
    fn error_message_falls_back_to_clipped_body() {
        assert_eq!(error_message(""), "empty error response");
        assert_eq!(error_message("<html>bad gateway</html>"), "<html>bad gateway</html>");
        assert_eq!(
            error_message(r#"{"error": {"message": "nope", "status": "PERMISSION_DENIED"}}"#),
            "PERMISSION_DENIED: nope"
        );
    }
}
